//! MNIST でモデルを学習して保存するバイナリ
//!
//! 使い方: `train [出力パス]`（省略時は config.json の model.model_path）

use anyhow::Result;
use burn::backend::Wgpu;
use burn_autodiff::Autodiff;
use burn::tensor::backend::Backend;
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;
use std::path::Path;

use digit_pad_lib::ml::{resolve_output_path, train_model, DigitClassifier};
use digit_pad_lib::model::{load_metadata, print_metadata_info, AppConfig, DeviceType};

fn main() -> Result<()> {
    digit_pad_lib::init_logging();

    let config = AppConfig::load_or_default();
    config.display();

    let output_path = resolve_output_path(&config.model.model_path, std::env::args().nth(1));
    log::info!("保存先: {}", output_path.display());
    report_existing_model(&output_path);

    match config.device_type {
        DeviceType::Wgpu => train_and_save::<Wgpu>(&config, &WgpuDevice::default(), &output_path),
        DeviceType::Cpu => train_and_save::<NdArray>(&config, &NdArrayDevice::Cpu, &output_path),
    }
}

/// 上書き前に既存モデルの情報を表示
fn report_existing_model(output_path: &Path) {
    if !output_path.exists() {
        return;
    }
    match load_metadata(output_path) {
        Ok(metadata) => {
            log::info!("既存のモデルを上書きします");
            print_metadata_info(&metadata);
        }
        Err(e) => log::warn!("既存のモデルを読み込めません（上書きします）: {:#}", e),
    }
}

fn train_and_save<B: Backend>(config: &AppConfig, device: &B::Device, output_path: &Path) -> Result<()> {
    log::info!("使用デバイス: {:?}", device);

    let (model, metadata) = train_model::<Autodiff<B>>(&config.training, device)?;
    let classifier = DigitClassifier::<B>::from_model(model, metadata, device.clone());
    classifier.save(output_path)?;

    print_metadata_info(classifier.metadata());
    Ok(())
}
