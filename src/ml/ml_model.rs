//! 機械学習モデルの共通定義
//!
//! 手書き数字分類用のCNNモデルと関連する設定を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::types::{INPUT_SIZE, NUM_CLASSES};

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 10)]
    pub num_classes: usize,
    /// ドロップアウト率
    #[config(default = 0.2)]
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    #[config(default = 28)]
    pub image_size: usize,
}

impl ModelConfig {
    /// 数字分類用のデフォルト設定
    pub fn digits() -> Self {
        Self::new()
            .with_num_classes(NUM_CLASSES)
            .with_image_size(INPUT_SIZE)
    }

    /// Flatten 後の特徴次元
    ///
    /// Conv1 (5x5): size -> size - 4
    /// Pool1 (2x2): -> / 2
    /// Conv2 (3x3): -> - 2
    /// Pool2 (2x2): -> / 2
    pub fn feature_dim(&self) -> usize {
        let after_conv1 = self.image_size.saturating_sub(4);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        15 * after_pool2 * after_pool2
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitNet<B> {
        let d = self.feature_dim();
        log::debug!(
            "[Model] 入力: {}x{}, Flatten後の特徴次元: {}",
            self.image_size,
            self.image_size,
            d
        );

        DigitNet {
            conv1: Conv2dConfig::new([1, 30], [5, 5]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([30, 15], [3, 3]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(d, 128).init(device),
            fc2: LinearConfig::new(128, 50).init(device),
            fc3: LinearConfig::new(50, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// 手書き数字分類用CNNモデル
///
/// # アーキテクチャ
/// - Conv 5x5 (1 -> 30) + ReLU + MaxPool 2x2
/// - Conv 3x3 (30 -> 15) + ReLU + MaxPool 2x2
/// - Dropout
/// - Flatten
/// - FC: 375 -> 128 + ReLU
/// - FC: 128 -> 50 + ReLU
/// - FC: 50 -> num_classes
/// - Softmax (分類時)
#[derive(Module, Debug)]
pub struct DigitNet<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    dropout: Dropout,

    // 全結合層
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,

    activation: Relu,
}

impl<B: Backend> DigitNet<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 1, 28, 28]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.dropout.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        self.fc3.forward(x)
    }

    /// クラス確率（softmax）
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// 順伝播と損失計算（学習用）
    ///
    /// ターゲットはクラスインデックス。one-hot化は損失関数側で行われる
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
