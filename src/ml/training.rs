//! MNIST を使ったモデル学習

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::Module,
    tensor::{backend::{AutodiffBackend, Backend}, Int, Tensor, TensorData},
};
use burn_dataset::vision::{MnistDataset, MnistItem};

use crate::ml::{DigitNet, ModelConfig};
use crate::model::{ModelMetadata, TrainingSettings};
use crate::types::{INPUT_SIZE, PIXEL_SCALE};

/// バッチャー（MNIST の画素を 0〜1 に正規化して [N, 1, 28, 28] にまとめる）
#[derive(Clone, Default)]
pub struct DigitBatcher;

/// バッチデータ
#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, DigitBatch<B>> for DigitBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> DigitBatch<B> {
        let batch_size = items.len();
        let mut all_pixels = Vec::with_capacity(batch_size * INPUT_SIZE * INPUT_SIZE);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in items {
            all_pixels.extend(item.image.iter().flatten().map(|&v| v / PIXEL_SCALE));
            targets_vec.push(item.label as i64);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(all_pixels, [batch_size, 1, INPUT_SIZE, INPUT_SIZE]),
            device,
        );
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), device);

        DigitBatch { images, targets }
    }
}

/// TrainStep実装 (学習時の順伝播 + 逆伝播)
impl<B: AutodiffBackend> burn::train::TrainStep<DigitBatch<B>, burn::train::ClassificationOutput<B>> for DigitNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> burn::train::TrainOutput<burn::train::ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);
        let grads = item.loss.backward();
        burn::train::TrainOutput::new(self, grads, item)
    }
}

/// ValidStep実装 (検証時の順伝播のみ)
impl<B: Backend> burn::train::ValidStep<DigitBatch<B>, burn::train::ClassificationOutput<B>> for DigitNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> burn::train::ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// モデル学習を実行
///
/// MNIST の学習用 60,000 枚で学習し、テスト用 10,000 枚で検証・評価します。
/// データセットは burn がダウンロードしてキャッシュします。
/// 完了までブロックし、途中から再開はできません。
///
/// # 戻り値
/// - (推論用バックエンドの学習済みモデル, メタデータ)
pub fn train_model<B: AutodiffBackend>(
    settings: &TrainingSettings,
    device: &B::Device,
) -> Result<(DigitNet<B::InnerBackend>, ModelMetadata)> {
    use burn::{
        data::dataloader::DataLoaderBuilder,
        optim::AdamConfig,
        train::{
            metric::{AccuracyMetric, LossMetric},
            LearnerBuilder, LearningStrategy,
        },
    };

    let dataset_train = MnistDataset::train();
    let dataset_test = Arc::new(MnistDataset::test());

    log::info!("学習データ: {} 枚", dataset_train.len());
    log::info!("テストデータ: {} 枚", dataset_test.len());
    log::info!(
        "エポック数: {}, バッチサイズ: {}, 学習率: {}",
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate
    );

    let dataloader_train = DataLoaderBuilder::new(DigitBatcher)
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(DigitBatcher)
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(dataset_test.clone());

    let model_config = ModelConfig::digits().with_dropout(settings.dropout);
    let model = model_config.init::<B>(device);

    // アーティファクトディレクトリ（学習ログ用、終了後に削除）
    let artifact_dir = std::env::temp_dir().join("digit_pad_training");
    std::fs::remove_dir_all(&artifact_dir).ok();
    std::fs::create_dir_all(&artifact_dir)?;
    let artifact_dir_str = artifact_dir.to_string_lossy().to_string();

    let learner = LearnerBuilder::new(&artifact_dir_str)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(settings.num_epochs)
        .summary()
        .build(model, AdamConfig::new().init(), settings.learning_rate);

    log::info!("学習を開始します...");
    let model_trained = learner.fit(dataloader_train, dataloader_valid);
    log::info!("学習が完了しました");

    let trained_model = model_trained.model;
    log::info!("学習済みモデルのパラメータ数: {}", trained_model.num_params());

    let accuracy = evaluate(&trained_model, dataset_test.as_ref(), settings.batch_size, device)?;
    log::info!("Error: {:.2}%", 100.0 - accuracy * 100.0);

    std::fs::remove_dir_all(&artifact_dir).ok();

    let metadata = ModelMetadata::new(
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate,
        Some(accuracy),
    );

    Ok((trained_model, metadata))
}

/// データセット全体での正解率（0〜1）
pub fn evaluate<B: Backend, D: Dataset<MnistItem>>(
    model: &DigitNet<B>,
    dataset: &D,
    batch_size: usize,
    device: &B::Device,
) -> Result<f64> {
    let batch_size = batch_size.max(1);
    let total = dataset.len();
    if total == 0 {
        anyhow::bail!("評価データが空です");
    }

    let mut correct = 0usize;
    let mut start = 0usize;
    while start < total {
        let end = (start + batch_size).min(total);
        let items: Vec<MnistItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        let batch: DigitBatch<B> = DigitBatcher.batch(items, device);

        let predicted = model
            .forward(batch.images)
            .argmax(1)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?;
        let targets = batch
            .targets
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("ラベルの取得エラー: {:?}", e))?;

        correct += predicted.iter().zip(&targets).filter(|(p, t)| p == t).count();
        start = end;
    }

    Ok(correct as f64 / total as f64)
}

/// 学習済みモデルを保存するパス
pub fn resolve_output_path(model_path: &str, override_path: Option<String>) -> PathBuf {
    override_path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(model_path))
}
