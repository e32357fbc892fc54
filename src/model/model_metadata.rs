//! モデルメタデータの定義
//!
//! tar.gz形式のモデルファイルに同梱され、読み込み時の整合性チェックに使われます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{INPUT_SIZE, NUM_CLASSES};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 分類クラス数（常に10）
    pub num_classes: usize,

    /// モデル入力サイズ（正方形、通常28）
    pub image_size: usize,

    /// 学習エポック数
    pub num_epochs: usize,

    /// バッチサイズ
    pub batch_size: usize,

    /// 学習率
    pub learning_rate: f64,

    /// テストデータでの正解率（0〜1、未評価なら None）
    #[serde(default)]
    pub test_accuracy: Option<f64>,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成（学習時刻は現在時刻）
    pub fn new(num_epochs: usize, batch_size: usize, learning_rate: f64, test_accuracy: Option<f64>) -> Self {
        Self {
            num_classes: NUM_CLASSES,
            image_size: INPUT_SIZE,
            num_epochs,
            batch_size,
            learning_rate,
            test_accuracy,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// このアプリの入力形式と互換性があるか確認
    pub fn validate(&self) -> Result<()> {
        if self.num_classes != NUM_CLASSES {
            anyhow::bail!("クラス数が不正です: {} (期待: {})", self.num_classes, NUM_CLASSES);
        }
        if self.image_size != INPUT_SIZE {
            anyhow::bail!("入力サイズが不正です: {} (期待: {})", self.image_size, INPUT_SIZE);
        }
        Ok(())
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_is_valid() {
        let metadata = ModelMetadata::new(10, 200, 1e-3, Some(0.99));
        assert!(metadata.validate().is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.trained_at).is_ok());
    }

    #[test]
    fn test_incompatible_metadata_is_rejected() {
        let mut metadata = ModelMetadata::new(1, 32, 1e-3, None);
        metadata.image_size = 48;
        assert!(metadata.validate().is_err());

        let mut metadata = ModelMetadata::new(1, 32, 1e-3, None);
        metadata.num_classes = 14;
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_json_without_accuracy_parses() {
        let json = r#"{
            "num_classes": 10,
            "image_size": 28,
            "num_epochs": 3,
            "batch_size": 64,
            "learning_rate": 0.001,
            "trained_at": "2026-01-01T00:00:00+09:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.test_accuracy, None);
        assert_eq!(metadata.num_epochs, 3);
    }
}
