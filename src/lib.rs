mod types;
pub mod canvas;
pub mod normalizer;
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;
#[cfg(feature = "ml")]
mod app;
#[cfg(feature = "ml")]
mod ui;

pub use types::{format_confidence, InputTensor, Prediction, INPUT_SIZE, NUM_CLASSES, PIXEL_SCALE};
#[cfg(feature = "ml")]
pub use app::{DigitPad, Outcome};

#[cfg(feature = "ml")]
use burn::{backend::Wgpu, tensor::backend::Backend};
#[cfg(feature = "ml")]
use burn_ndarray::{NdArray, NdArrayDevice};
#[cfg(feature = "ml")]
use burn_wgpu::WgpuDevice;

#[cfg(feature = "ml")]
use canvas::DrawingCanvas;
#[cfg(feature = "ml")]
use ml::DigitClassifier;
#[cfg(feature = "ml")]
use model::{AppConfig, DeviceType};

/// ログを初期化（RUST_LOG が無ければ info）
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// 設定を読み込み、分類器を初期化してウィンドウを開く
#[cfg(feature = "ml")]
pub fn run() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::load_or_default();
    config.display();

    match config.device_type {
        DeviceType::Wgpu => launch::<Wgpu>(&config, WgpuDevice::default()),
        DeviceType::Cpu => launch::<NdArray>(&config, NdArrayDevice::Cpu),
    }
}

#[cfg(feature = "ml")]
fn launch<B: Backend>(config: &AppConfig, device: B::Device) -> anyhow::Result<()> {
    log::info!("使用デバイス: {:?}", device);

    // 分類器は起動時に一度だけ初期化してアプリへ渡す
    let classifier = match DigitClassifier::<B>::load_or_train(&config.model, &config.training, &device) {
        Ok(classifier) => Some(classifier),
        Err(e) => {
            log::error!("分類器を初期化できません: {:#}", e);
            None
        }
    };

    let canvas = DrawingCanvas::new(config.canvas.size, config.canvas.pen_width);
    let app = DigitPad::new(canvas, classifier);

    let window_width = config.canvas.size as f32 + 180.0;
    let window_height = config.canvas.size as f32 + 24.0;
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([window_width, window_height])
            .with_resizable(false),
        ..Default::default()
    };

    eframe::run_native(
        "Digit Pad",
        native_options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("ウィンドウの起動に失敗しました: {}", e))
}
