//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデルファイル、学習パラメータ、キャンバスの設定をJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 計算デバイスの種類
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Wgpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// 学習済みモデル（tar.gz）のパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/digit_classifier.tar.gz".to_string(),
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// ワーカー数
    pub num_workers: usize,
    /// 学習率
    pub learning_rate: f64,
    /// ランダムシード（データローダーのシャッフル用）
    pub seed: u64,
    /// ドロップアウト率
    pub dropout: f64,
    /// 起動時にモデルが無ければ学習を実行するか
    pub train_if_missing: bool,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            batch_size: 200,
            num_workers: 1,
            learning_rate: 1e-3,
            seed: 42,
            dropout: 0.2,
            train_if_missing: false,
        }
    }
}

/// キャンバス設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    /// キャンバスの一辺（ピクセル、正方形）
    pub size: u32,
    /// ペン幅（ピクセル）
    pub pen_width: u32,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            size: 250,
            pen_width: 20,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// トレーニング設定
    #[serde(default)]
    pub training: TrainingSettings,
    /// キャンバス設定
    #[serde(default)]
    pub canvas: CanvasSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    /// 指定パスから設定を読み込む、存在しないか読めない場合はデフォルト設定を返す
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    log::info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            log::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報をログに出力
    pub fn display(&self) {
        log::info!("=== アプリケーション設定 ===");
        log::info!("計算デバイス: {}", self.device_type);
        log::info!("モデルパス: {}", self.model.model_path);
        log::info!("--- トレーニング設定 ---");
        log::info!("エポック数: {}", self.training.num_epochs);
        log::info!("バッチサイズ: {}", self.training.batch_size);
        log::info!("学習率: {}", self.training.learning_rate);
        log::info!("シード: {}", self.training.seed);
        log::info!("ドロップアウト率: {}", self.training.dropout);
        log::info!("モデルが無い場合に学習: {}", self.training.train_if_missing);
        log::info!("--- キャンバス設定 ---");
        log::info!("サイズ: {}x{}", self.canvas.size, self.canvas.size);
        log::info!("ペン幅: {}", self.canvas.pen_width);
    }
}
