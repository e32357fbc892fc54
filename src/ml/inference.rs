//! モデル推論機能

use anyhow::{Context, Result};
use std::path::Path;
use burn::{
    backend::Autodiff,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};

use crate::ml::{train_model, DigitNet, ModelConfig};
use crate::model::{load_model_with_metadata, save_model_with_metadata, ModelMetadata, ModelSettings, TrainingSettings};
use crate::types::{InputTensor, Prediction, INPUT_SIZE};

/// 数字分類器
///
/// 読み込み済みモデルを1つだけ所有します。起動時に一度だけ初期化し、
/// 推論が必要なコンポーネントへ渡して使います。
pub struct DigitClassifier<B: Backend> {
    model: DigitNet<B>,
    metadata: ModelMetadata,
    device: B::Device,
}

impl<B: Backend> DigitClassifier<B> {
    /// モデルファイル（tar.gz）を読み込んで分類器を初期化
    pub fn load<P: AsRef<Path>>(model_path: P, device: &B::Device) -> Result<Self> {
        let model_path = model_path.as_ref();
        let (metadata, model_binary) = load_model_with_metadata(model_path)
            .context(format!("モデルファイルを読み込めません: {}", model_path.display()))?;
        metadata.validate()?;

        let model = ModelConfig::digits().init::<B>(device);

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        log::info!("モデルを読み込みました: {}", model_path.display());
        Ok(Self::from_model(model, metadata, device.clone()))
    }

    /// 学習済みのモデルから分類器を作成
    pub fn from_model(model: DigitNet<B>, metadata: ModelMetadata, device: B::Device) -> Self {
        Self {
            model,
            metadata,
            device,
        }
    }

    /// モデルを読み込み、無ければ（設定で許可されている場合のみ）学習して保存する
    ///
    /// 学習は同期的に実行され、完了までブロックします。
    pub fn load_or_train(
        model_settings: &ModelSettings,
        training_settings: &TrainingSettings,
        device: &B::Device,
    ) -> Result<Self> {
        let model_path = Path::new(&model_settings.model_path);

        match Self::load(model_path, device) {
            Ok(classifier) => Ok(classifier),
            Err(e) if training_settings.train_if_missing => {
                log::warn!("{:#}", e);
                log::warn!("モデルが見つかりません。新しいモデルを学習します（数分かかります）");

                let (model, metadata) = train_model::<Autodiff<B>>(training_settings, device)?;
                let classifier = Self::from_model(model, metadata, device.clone());
                classifier.save(model_path)?;
                Ok(classifier)
            }
            Err(e) => Err(e),
        }
    }

    /// モデルとメタデータを tar.gz として保存
    pub fn save<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let model_binary = recorder
            .record(self.model.clone().into_record(), ())
            .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

        save_model_with_metadata(output_path.as_ref(), &self.metadata, &model_binary)
    }

    /// 1枚の入力テンソルを分類
    pub fn predict(&self, input: &InputTensor) -> Result<Prediction> {
        // [1, 28, 28, 1] (NHWC) と [1, 1, 28, 28] (NCHW) はチャネル1なので同じ配置
        let images = Tensor::<B, 1>::from_floats(input.values(), &self.device)
            .reshape([1, 1, INPUT_SIZE, INPUT_SIZE]);

        let probabilities = self
            .model
            .probabilities(images)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?;

        Prediction::from_probabilities(probabilities)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use std::path::PathBuf;

    type TestBackend = NdArray<f32>;

    fn fresh_classifier() -> DigitClassifier<TestBackend> {
        let device = Default::default();
        let model = ModelConfig::digits().init::<TestBackend>(&device);
        DigitClassifier::from_model(model, ModelMetadata::new(0, 0, 0.0, None), device)
    }

    fn temp_model_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("digit_pad_inference_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_predict_on_black_image_is_well_formed() {
        let classifier = fresh_classifier();
        let prediction = classifier.predict(&InputTensor::zeros()).unwrap();

        assert!(prediction.class < 10);
        assert!(prediction.confidence >= 0.1 - 1e-6);
        assert!(prediction.confidence <= 1.0);

        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let classifier = fresh_classifier();
        let input = InputTensor::from_values((0..28 * 28).map(|i| (i % 7) as f32 / 6.0).collect()).unwrap();

        let first = classifier.predict(&input).unwrap();
        let second = classifier.predict(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_saved_model_predicts_the_same() {
        let path = temp_model_path("saved.tar.gz");
        let classifier = fresh_classifier();
        classifier.save(&path).unwrap();

        let device = Default::default();
        let loaded = DigitClassifier::<TestBackend>::load(&path, &device).unwrap();

        let input = InputTensor::from_values((0..28 * 28).map(|i| ((i * 13) % 255) as f32 / 255.0).collect()).unwrap();
        let expected = classifier.predict(&input).unwrap();
        let actual = loaded.predict(&input).unwrap();

        assert_eq!(expected.class, actual.class);
        assert!((expected.confidence - actual.confidence).abs() < 1e-6);
        assert_eq!(loaded.metadata(), classifier.metadata());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_model_without_training_is_an_error() {
        let model_settings = ModelSettings {
            model_path: temp_model_path("missing.tar.gz").to_string_lossy().to_string(),
        };
        let training_settings = TrainingSettings::default();
        assert!(!training_settings.train_if_missing);

        let device = Default::default();
        let result = DigitClassifier::<TestBackend>::load_or_train(&model_settings, &training_settings, &device);
        assert!(result.is_err());
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let path = temp_model_path("corrupt.tar.gz");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"this is not a gzip stream").unwrap();

        let device = Default::default();
        assert!(DigitClassifier::<TestBackend>::load(&path, &device).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_truncated_weights_are_an_error() {
        let path = temp_model_path("truncated.tar.gz");
        let metadata = ModelMetadata::new(1, 10, 1e-3, None);
        save_model_with_metadata(&path, &metadata, &[1, 2, 3, 4]).unwrap();

        let device = Default::default();
        assert!(DigitClassifier::<TestBackend>::load(&path, &device).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_incompatible_metadata_is_an_error() {
        let path = temp_model_path("wrong_size.tar.gz");
        fresh_classifier().save(&path).unwrap();
        let (_, model_bytes) = load_model_with_metadata(&path).unwrap();

        let mut metadata = ModelMetadata::new(1, 10, 1e-3, None);
        metadata.image_size = 48;
        save_model_with_metadata(&path, &metadata, &model_bytes).unwrap();

        let device = Default::default();
        assert!(DigitClassifier::<TestBackend>::load(&path, &device).is_err());

        std::fs::remove_file(&path).ok();
    }
}
