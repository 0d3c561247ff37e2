use burn::backend::ndarray::NdArray;
use burn::tensor::{Distribution, Tensor};
use models::{
    bilinear_weights, FcnDecoder, FcnDecoderConfig, FcnVgg16, UpsampleInit, Vgg16, Vgg16Config,
    VggFeatures, DECODER_SCALE,
};

type Backend = NdArray<f32>;

fn tiny_vgg() -> Vgg16Config {
    Vgg16Config {
        block_channels: [4, 4, 6, 8, 8],
        fc_channels: 12,
        ..Default::default()
    }
}

fn random_features(
    h7: usize,
    w7: usize,
    cfg: &Vgg16Config,
    device: &<Backend as burn::tensor::backend::Backend>::Device,
) -> VggFeatures<Backend> {
    let normal = Distribution::Normal(0.0, 1.0);
    VggFeatures {
        layer3_out: Tensor::random([1, cfg.layer3_channels(), h7 * 4, w7 * 4], normal, device),
        layer4_out: Tensor::random([1, cfg.layer4_channels(), h7 * 2, w7 * 2], normal, device),
        layer7_out: Tensor::random([1, cfg.layer7_channels(), h7, w7], normal, device),
    }
}

#[test]
fn decoder_restores_backbone_downsampling() {
    let device = Default::default();
    let cfg = tiny_vgg();
    for num_classes in [2, 3] {
        let decoder =
            FcnDecoder::<Backend>::new(FcnDecoderConfig::for_backbone(&cfg, num_classes), &device);
        for (h7, w7) in [(5, 18), (1, 1), (2, 3)] {
            let out = decoder.forward(random_features(h7, w7, &cfg, &device));
            assert_eq!(
                out.dims(),
                [1, num_classes, h7 * DECODER_SCALE, w7 * DECODER_SCALE]
            );
        }
    }
}

#[test]
fn backbone_taps_have_expected_strides() {
    let device = Default::default();
    let cfg = tiny_vgg();
    let vgg = Vgg16::<Backend>::new(cfg.clone(), &device);
    let images = Tensor::<Backend, 4>::zeros([2, 3, 160, 576], &device);
    let features = vgg.forward(images);
    assert_eq!(features.layer3_out.dims(), [2, 6, 20, 72]);
    assert_eq!(features.layer4_out.dims(), [2, 8, 10, 36]);
    assert_eq!(features.layer7_out.dims(), [2, 12, 5, 18]);
    assert!((vgg.keep_prob() - 0.8).abs() < 1e-12);
}

#[test]
fn full_model_outputs_input_resolution() {
    let device = Default::default();
    let cfg = tiny_vgg();
    let model = FcnVgg16::<Backend>::new(
        Vgg16::new(cfg.clone(), &device),
        FcnDecoderConfig::for_backbone(&cfg, 2),
        &device,
    );
    let out = model.forward(Tensor::zeros([1, 3, 64, 96], &device));
    assert_eq!(out.dims(), [1, 2, 64, 96]);
}

#[test]
fn bilinear_init_seeds_upsample_weights() {
    let device = Default::default();
    let cfg = FcnDecoderConfig::for_backbone(&tiny_vgg(), 2);
    let decoder = FcnDecoder::<Backend>::new(cfg.clone(), &device);
    let [w7, _, w347] = decoder.upsample_weights();

    let expected = bilinear_weights([4, 4, 2, 2], 2)
        .to_conv_transpose_data()
        .to_vec::<f32>()
        .unwrap();
    assert_eq!(w7.dims(), [2, 2, 4, 4]);
    assert_eq!(w7.into_data().to_vec::<f32>().unwrap(), expected);

    let expected = bilinear_weights([16, 16, 2, 2], 8)
        .to_conv_transpose_data()
        .to_vec::<f32>()
        .unwrap();
    assert_eq!(w347.into_data().to_vec::<f32>().unwrap(), expected);

    let random = FcnDecoder::<Backend>::new(
        FcnDecoderConfig {
            upsample_init: UpsampleInit::Random,
            ..cfg
        },
        &device,
    );
    let [w7_random, _, _] = random.upsample_weights();
    let values = w7_random.into_data().to_vec::<f32>().unwrap();
    // Off-diagonal channel block is no longer forced to zero.
    assert!(values[16..32].iter().any(|v| *v != 0.0));
}

#[test]
fn bilinear_stage_taps_sum_to_one() {
    let device = Default::default();
    let cfg = FcnDecoderConfig {
        num_classes: 1,
        layer3_channels: 1,
        layer4_channels: 1,
        layer7_channels: 1,
        upsample_init: UpsampleInit::Bilinear,
    };
    let decoder = FcnDecoder::<Backend>::new(cfg, &device);
    let [w7, _, _] = decoder.upsample_weights();
    // Interior output pixels of a stride-2 stage see one tap phase per axis.
    let taps = w7.into_data().to_vec::<f32>().unwrap();
    for phase in [[0usize, 2], [1, 3]] {
        let mut sum = 0.0f32;
        for x in phase {
            for y in phase {
                sum += taps[x * 4 + y];
            }
        }
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
