use serde::{Deserialize, Serialize};

/// 分類クラス数（数字 0〜9）
pub const NUM_CLASSES: usize = 10;

/// モデル入力の一辺（ピクセル）
pub const INPUT_SIZE: usize = 28;

/// 画素値の正規化スケール（0〜255 -> 0〜1）
pub const PIXEL_SCALE: f32 = 255.0;

/// 分類器に渡す入力テンソル
///
/// 形状は常に `[1, 28, 28, 1]`（NHWC）。
/// チャネルが1つなので NCHW `[1, 1, 28, 28]` とメモリ配置は同一。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// テンソル形状 (batch, height, width, channel)
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE, INPUT_SIZE, 1];

    /// 平坦化された値からテンソルを作成
    ///
    /// 要素数が形状と一致しない場合はエラー
    pub fn from_values(data: Vec<f32>) -> anyhow::Result<Self> {
        let expected: usize = Self::SHAPE.iter().product();
        if data.len() != expected {
            anyhow::bail!(
                "テンソルの要素数が不正です: {} (期待: {})",
                data.len(),
                expected
            );
        }
        Ok(Self { data })
    }

    /// 全要素 0（真っ黒な画像）
    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; INPUT_SIZE * INPUT_SIZE],
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        Self::SHAPE
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// (y, x) の値
    pub fn get(&self, y: usize, x: usize) -> Option<f32> {
        if y >= INPUT_SIZE || x >= INPUT_SIZE {
            return None;
        }
        self.data.get(y * INPUT_SIZE + x).copied()
    }
}

/// 分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 予測クラス（0〜9）
    pub class: u8,
    /// 予測クラスの確率（0〜1）
    pub confidence: f32,
    /// 全クラスの確率分布
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// 確率分布から argmax と最大値を取り出して結果を作成
    pub fn from_probabilities(probabilities: Vec<f32>) -> anyhow::Result<Self> {
        if probabilities.len() != NUM_CLASSES {
            anyhow::bail!(
                "確率ベクトルの長さが不正です: {} (期待: {})",
                probabilities.len(),
                NUM_CLASSES
            );
        }

        let (class, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        if !confidence.is_finite() {
            anyhow::bail!("確率ベクトルに有限値がありません");
        }

        Ok(Self {
            class: class as u8,
            confidence: confidence.clamp(0.0, 1.0),
            probabilities,
        })
    }

    /// 表示用ラベル（例: "7"）
    pub fn label_text(&self) -> String {
        self.class.to_string()
    }

    /// 表示用の確信度（例: 0.873 -> "87%"）
    pub fn confidence_text(&self) -> String {
        format_confidence(self.confidence)
    }
}

/// 確信度を整数パーセントに四捨五入（0.5 は切り上げ）して文字列化
pub fn format_confidence(confidence: f32) -> String {
    let percent = (f64::from(confidence) * 100.0 + 0.5).floor();
    format!("{}%", percent.clamp(0.0, 100.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_confidence_rounding() {
        assert_eq!(format_confidence(0.5), "50%");
        assert_eq!(format_confidence(0.873), "87%");
        assert_eq!(format_confidence(0.999), "100%");
        assert_eq!(format_confidence(0.125), "13%");
        assert_eq!(format_confidence(0.0), "0%");
        assert_eq!(format_confidence(1.0), "100%");
    }

    #[test]
    fn test_prediction_picks_argmax() {
        let mut probs = vec![0.02; NUM_CLASSES];
        probs[7] = 0.82;
        let prediction = Prediction::from_probabilities(probs).unwrap();

        assert_eq!(prediction.class, 7);
        assert!((prediction.confidence - 0.82).abs() < 1e-6);
        assert_eq!(prediction.label_text(), "7");
        assert_eq!(prediction.confidence_text(), "82%");
    }

    #[test]
    fn test_prediction_ties_resolve_to_first_class() {
        let probs = vec![0.1; NUM_CLASSES];
        let prediction = Prediction::from_probabilities(probs).unwrap();
        assert_eq!(prediction.class, 0);
        assert_eq!(prediction.confidence_text(), "10%");
    }

    #[test]
    fn test_prediction_rejects_wrong_length() {
        assert!(Prediction::from_probabilities(vec![1.0]).is_err());
    }

    #[test]
    fn test_input_tensor_shape_is_enforced() {
        assert!(InputTensor::from_values(vec![0.0; 10]).is_err());

        let tensor = InputTensor::from_values(vec![0.5; 28 * 28]).unwrap();
        assert_eq!(tensor.shape(), [1, 28, 28, 1]);
        assert_eq!(tensor.get(27, 27), Some(0.5));
        assert_eq!(tensor.get(28, 0), None);
    }
}
