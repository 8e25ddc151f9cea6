//! Frame loop example for archetype_resource
//!
//! Drives a material and a mesh through the resource pipeline on the mock
//! backend, then hot-reloads a texture. Run with `RUST_LOG=debug` to see the
//! state transitions.

use archetype_resource::library::{MaterialTextureSlot, MeshChunkAssetData, ShaderSampler};
use archetype_resource::pipeline::{VertexDeclaration, VertexFormat, VertexSemantic};
use archetype_resource::{
    CacheConfig, CustomResourceManager, GpuTextureFormat, InMemoryAssetLibrary,
    MaterialAssetData, MeshAssetData, MockGpu, MockSpawner, PipelineUid, ShaderAssetData,
    TaskComplete, TextureAssetData, TextureKind,
};
use std::collections::HashMap;
use std::sync::Arc;

fn checker(seed: u8) -> TextureAssetData {
    let data = (0..64u8).map(|i| if (i / 4) % 2 == 0 { seed } else { 255 - seed }).collect();
    TextureAssetData::single_level(4, 4, GpuTextureFormat::Rgba8Unorm, data)
}

fn populate(library: &InMemoryAssetLibrary) {
    library.insert_texture("checker", checker(0));
    library.insert_shader(
        "lit",
        ShaderAssetData {
            vertex_source: "void main() { gl_Position = vec4(0.0); }".into(),
            pixel_source: "void main() {}".into(),
            geometry_source: None,
            samplers: vec![ShaderSampler {
                name: "albedo".into(),
                kind: TextureKind::Texture2D,
            }],
        },
    );
    library.insert_material(
        "floor",
        MaterialAssetData {
            shader_asset: "lit".into(),
            textures: vec![MaterialTextureSlot::texture("checker")],
            ..Default::default()
        },
    );
    library.insert_mesh(
        "quad",
        MeshAssetData {
            chunks: vec![MeshChunkAssetData {
                vertex_data: vec![0; 48],
                vertex_declaration: VertexDeclaration::packed(&[(
                    VertexSemantic::Position,
                    VertexFormat::Float32x3,
                )]),
                indices: vec![0, 1, 2, 2, 3, 0],
                material_name: "surface".into(),
                ..Default::default()
            }],
            material_assets: HashMap::from([("surface".to_string(), "floor".to_string())]),
            ..Default::default()
        },
    );
}

type Manager = CustomResourceManager<MockGpu, MockSpawner>;

/// Run frames until the mesh is drawable, returning how many it took
fn run_until_ready(manager: &mut Manager, spawner: &MockSpawner) -> anyhow::Result<usize> {
    for frame in 1..=32 {
        let mesh = manager.get_mesh_from_asset("quad", PipelineUid::default())?;
        manager.mark_as_active(mesh);
        match manager.is_data_processed(mesh) {
            TaskComplete::Yes => return Ok(frame),
            TaskComplete::Error => anyhow::bail!("mesh failed to build"),
            TaskComplete::No => {}
        }
        // Worker threads would run these in the background
        spawner.run_pending();
        manager.update();
    }
    anyhow::bail!("mesh not ready after 32 frames")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("archetype_resource v{}", archetype_resource::VERSION);
    println!("Frame Loop Demo");
    println!("===============\n");

    let library = Arc::new(InMemoryAssetLibrary::new());
    populate(&library);

    let spawner = MockSpawner::deferred();
    let mut manager = CustomResourceManager::new(
        MockGpu::new(),
        spawner.clone(),
        library.clone(),
        CacheConfig::default(),
    );
    manager.initialize();

    let frames = run_until_ready(&mut manager, &spawner)?;
    println!("Mesh ready after {frames} frames");

    let mesh = manager.get_mesh_from_asset("quad", PipelineUid::default())?;
    if let Some(data) = manager.mesh_data(mesh) {
        for chunk in data.chunks_for(None) {
            let material = manager.material_data(chunk.material);
            println!(
                "  chunk: {} vertices, {} indices, material ready: {}",
                chunk.vertex_count,
                chunk.index_count,
                material.is_some()
            );
        }
    }

    // Hot reload: the texture changes on disk
    library.insert_texture("checker", checker(128));
    manager.mark_asset_dirty("checker");
    manager.update();
    spawner.run_pending();
    manager.update();
    let mesh = manager.get_mesh_from_asset("quad", PipelineUid::default())?;
    println!("After reload landed: {:?}", manager.state(mesh));
    let frames = run_until_ready(&mut manager, &spawner)?;
    println!("Rebuilt after texture change in {frames} frames");

    let metrics = manager.cache().metrics();
    println!(
        "\nCache: {} bytes resident, {} loads, {} failures",
        manager.cache().memory_usage(),
        metrics.loads_completed(),
        metrics.load_failures()
    );
    println!(
        "GPU: {} textures, {} pipelines",
        manager.gpu().textures_created(),
        manager.gpu().pipelines_created()
    );

    manager.shutdown();
    println!("\nFrame loop example complete!");
    Ok(())
}
