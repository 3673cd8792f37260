//! Integration tests for texture ownership and volume materials.
//!
//! Every test runs against the dummy backend and, when an adapter is
//! available, against a headless wgpu device.
//!
//! ```bash
//! cargo test --test volume_tests
//! VOLUME_GRAPHICS_BACKEND=dummy cargo test
//! ```

mod common;

use std::io::Cursor;

use glam::Vec4;
use rstest::rstest;

use common::{Backend, TempFile, TestContext};
use volume_graphics::resources::dds;
use volume_graphics::{
    format_for_bytes_per_voxel, load_raw_file, GpuBackend, MaterialState, ResourceViewProxy,
    TextureDescriptor, TextureDimension, TextureFormat, TextureImage, TextureUsage,
    ViewDescriptor, ViewKind, VolumeMaterial, VolumeTextureByteParams,
};

// ============================================================================
// Raw Volume Loader
// ============================================================================

#[test]
fn test_format_mapping_table() {
    for bytes_per_voxel in 0..=16 {
        let expected = match bytes_per_voxel {
            1 => TextureFormat::R8Unorm,
            2 => TextureFormat::R16Unorm,
            4 => TextureFormat::R32Float,
            _ => TextureFormat::Unknown,
        };
        assert_eq!(format_for_bytes_per_voxel(bytes_per_voxel), expected);
    }
}

#[test]
fn test_load_raw_file_infers_voxel_size() {
    let file = TempFile::with_contents("vol8.raw", &[0u8; 8]);
    let volume = load_raw_file(&file.path, 2, 2, 2).unwrap();
    assert_eq!(volume.bytes_per_voxel, 1);
    assert_eq!(volume.format(), TextureFormat::R8Unorm);
    assert_eq!(volume.len(), 8);

    let file = TempFile::with_contents("vol16.raw", &[0u8; 16]);
    let volume = load_raw_file(&file.path, 2, 2, 2).unwrap();
    assert_eq!(volume.bytes_per_voxel, 2);
    assert_eq!(volume.format(), TextureFormat::R16Unorm);
    assert_eq!(volume.len(), 16);
}

// ============================================================================
// Resource-View Proxy
// ============================================================================

/// A 4x4x4 R8 volume realizes to a texture reporting (4, 4, 4).
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_volume_roundtrip_dimensions(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let params = VolumeTextureByteParams::new(vec![0u8; 64], 4, 4, 4, TextureFormat::R8Unorm);
    let mut proxy = ResourceViewProxy::new(Some(ctx.device.clone()));
    proxy.create_from_volume(&params).unwrap();

    let texture = proxy.resource().expect("texture created");
    let desc = ctx.device.backend().texture_descriptor(texture).unwrap();
    assert_eq!((desc.width, desc.height, desc.depth), (4, 4, 4));
    assert_eq!(desc.dimension, TextureDimension::D3);
    assert!(proxy.shader_resource_view().is_some());
}

/// Repeated view creation exposes only the newest view and leaks nothing.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_view_replacement_releases_previous(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let baseline_tracked = ctx.tracked();
    let baseline_live = ctx.live();

    let mut proxy = ResourceViewProxy::new(Some(ctx.device.clone()));
    let desc = TextureDescriptor::new_2d(16, 16, TextureFormat::Rgba8Unorm)
        .with_usage(TextureUsage::SAMPLED | TextureUsage::RENDER_ATTACHMENT);
    proxy.create_empty(&desc, false).unwrap();

    let mut previous = Vec::new();
    for _ in 0..5 {
        proxy.create_default_view().unwrap();
        proxy.create_render_target_view(&ViewDescriptor::single_mip(0)).unwrap();
        let current = proxy.shader_resource_view().unwrap();
        assert!(!previous.contains(&current));
        previous.push(current);
        // texture plus one view of each created kind
        assert_eq!(ctx.tracked(), baseline_tracked + 3);
    }
    assert_eq!(proxy.view(ViewKind::ShaderResource), previous.last().copied());
    assert!(proxy.depth_stencil_view().is_none());

    proxy.release();
    assert_eq!(ctx.tracked(), baseline_tracked);
    assert_eq!(ctx.live(), baseline_live);
}

/// A texture shared by two proxies survives until both release it.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_shared_resource_outlives_first_release(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut first = ResourceViewProxy::new(Some(ctx.device.clone()));
    first
        .create_from_3d_array(&[1.0f32; 8], 2, 2, 2, TextureFormat::R32Float, true)
        .unwrap();
    let mut second = first.share();
    let texture = second.resource().unwrap();

    first.release();
    assert!(first.is_empty());
    assert!(second.resource_token().unwrap().is_live());
    assert!(ctx.device.backend().texture_descriptor(texture).is_some());

    second.release();
    assert!(ctx.device.backend().texture_descriptor(texture).is_none());
    assert_eq!(ctx.tracked(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_release_all_twice(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut proxy = ResourceViewProxy::new(Some(ctx.device.clone()));
    proxy
        .create_from_2d_array(&[0u8; 64], 4, 4, TextureFormat::Rgba8Unorm, 1, true)
        .unwrap();
    assert_eq!(ctx.tracked(), 2);

    ctx.device.arena().release_all();
    ctx.device.arena().release_all();
    assert_eq!(ctx.tracked(), 0);
    assert_eq!(ctx.live(), 0);

    // The proxy's tokens are dead; releasing them does nothing
    proxy.release();
    assert_eq!(ctx.live(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_png_stream_gets_mip_chain(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let img = image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .unwrap();

    let mut proxy = ResourceViewProxy::new(Some(ctx.device.clone()));
    proxy.create_from_stream(Some(Cursor::new(&png)), false).unwrap();
    assert_eq!(proxy.descriptor().unwrap().mip_levels, 4);
    assert_eq!(proxy.format(), Some(TextureFormat::Rgba8UnormSrgb));

    proxy.create_from_stream(Some(Cursor::new(&png)), true).unwrap();
    assert_eq!(proxy.descriptor().unwrap().mip_levels, 1);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_dds_volume_stream(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let image = TextureImage {
        name: "density".into(),
        width: 4,
        height: 2,
        depth: 3,
        dimension: TextureDimension::D3,
        format: TextureFormat::R32Float,
        mip_levels: 1,
        data: vec![0; 4 * 2 * 3 * 4],
    };
    let bytes = dds::encode(&image).unwrap();

    let mut proxy = ResourceViewProxy::new(Some(ctx.device.clone()));
    proxy.create_from_stream(Some(bytes.as_slice()), false).unwrap();
    let desc = proxy.descriptor().unwrap();
    assert_eq!(desc.dimension, TextureDimension::D3);
    assert_eq!((desc.width, desc.height, desc.depth), (4, 2, 3));
    assert_eq!(desc.format, TextureFormat::R32Float);
}

// ============================================================================
// Volume Materials
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_raw_material_lifecycle(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let file = TempFile::with_contents(&format!("{backend:?}-material.raw"), &[64u8; 27]);
    let mut material = VolumeMaterial::load_raw(&file.path, 3, 3, 3).unwrap();
    material.set_transfer_map(vec![Vec4::ZERO, Vec4::ONE]);
    assert_eq!(material.pass_name(), "Default");

    assert!(material.realize(&ctx.device).unwrap().is_some());
    assert!(material.transfer_map_view().is_some());
    let realized = ctx.tracked();

    material.set_sample_distance(0.5);
    assert_eq!(material.state(), MaterialState::Stale);
    material.realize(&ctx.device).unwrap();
    assert_eq!(ctx.tracked(), realized);

    material.dispose();
    assert_eq!(ctx.tracked(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_gradient_material_from_density(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let density: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
    let params = VolumeTextureByteParams::new(density, 4, 4, 4, TextureFormat::R8Unorm);
    let mut material = VolumeMaterial::from_gradient(params.compute_gradients().unwrap());
    assert_eq!(material.pass_name(), "Diffuse");

    let view = material.realize(&ctx.device).unwrap().unwrap();
    assert_eq!(view.format(), Some(TextureFormat::Rgba16Float));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_unknown_raw_format_is_rejected_at_creation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    // 3 bytes per voxel has no format
    let file = TempFile::with_contents(&format!("{backend:?}-rgb.raw"), &[0u8; 24]);
    let mut material = VolumeMaterial::load_raw(&file.path, 2, 2, 2).unwrap();
    assert!(material.realize(&ctx.device).is_err());
    assert_eq!(ctx.tracked(), 0);
}
