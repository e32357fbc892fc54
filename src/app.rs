//! アプリケーション状態
//!
//! キャンバス、分類器、直近の結果を保持します。
//! 描画は `ui` モジュールに任せ、ここでは送信・クリアの処理だけを行います。

use anyhow::Result;
use burn::tensor::backend::Backend;
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};
use eframe::{App, Frame};
use image::DynamicImage;

use crate::canvas::DrawingCanvas;
use crate::ml::DigitClassifier;
use crate::normalizer::normalize_image;
use crate::types::Prediction;
use crate::ui;

/// 送信結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Prediction(Prediction),
    Error(String),
}

/// 数字入力アプリ本体
pub struct DigitPad<B: Backend> {
    pub canvas: DrawingCanvas,
    classifier: Option<DigitClassifier<B>>,
    last_outcome: Option<Outcome>,
    /// 分類器が使えない場合の案内メッセージ
    status: Option<String>,

    // キャンバス表示用テクスチャ（描画内容が変わった時だけ更新）
    texture: Option<TextureHandle>,
    texture_dirty: bool,
}

impl<B: Backend> DigitPad<B> {
    /// 初期化済みの分類器を受け取ってアプリを作成
    pub fn new(canvas: DrawingCanvas, classifier: Option<DigitClassifier<B>>) -> Self {
        let status = if classifier.is_none() {
            Some("モデルがありません。`train` を実行してモデルを作成してください".to_string())
        } else {
            None
        };

        Self {
            canvas,
            classifier,
            last_outcome: None,
            status,
            texture: None,
            texture_dirty: true,
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// キャンバスをキャプチャして分類する
    ///
    /// 失敗した場合も結果は `last_outcome` に残る
    pub fn submit(&mut self) -> Result<Prediction> {
        let result = self.classify_canvas();
        self.last_outcome = Some(match &result {
            Ok(prediction) => {
                log::info!(
                    "予測: {} ({})",
                    prediction.label_text(),
                    prediction.confidence_text()
                );
                Outcome::Prediction(prediction.clone())
            }
            Err(e) => {
                log::error!("送信に失敗しました: {:#}", e);
                Outcome::Error(format!("{:#}", e))
            }
        });
        result
    }

    fn classify_canvas(&self) -> Result<Prediction> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("分類器が初期化されていません"))?;

        let bitmap = DynamicImage::ImageRgba8(self.canvas.capture());
        let input = normalize_image(&bitmap)?;
        classifier.predict(&input)
    }

    /// キャンバスと結果をリセット
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.last_outcome = None;
        self.texture_dirty = true;
    }

    /// ポインタ移動をキャンバスへ反映（キャンバス座標）
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.canvas.pointer_moved(x, y);
        self.texture_dirty = true;
    }

    pub fn pointer_released(&mut self) {
        self.canvas.pointer_released();
    }

    /// キャンバスのテクスチャを取得（必要なら更新）
    pub fn canvas_texture(&mut self, ctx: &egui::Context) -> egui::TextureId {
        let size = self.canvas.size() as usize;

        if self.texture_dirty || self.texture.is_none() {
            let image = ColorImage::from_gray([size, size], self.canvas.pixels().as_raw());
            match self.texture.as_mut() {
                Some(texture) => texture.set(image, TextureOptions::NEAREST),
                None => {
                    self.texture = Some(ctx.load_texture("canvas", image, TextureOptions::NEAREST));
                }
            }
            self.texture_dirty = false;
        }

        match &self.texture {
            Some(texture) => texture.id(),
            None => egui::TextureId::default(),
        }
    }
}

impl<B: Backend> App for DigitPad<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ui::draw_side_panel(self, ctx);
        ui::draw_central_panel(self, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ModelConfig;
    use crate::model::ModelMetadata;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn pad_with_fresh_model() -> DigitPad<TestBackend> {
        let device = Default::default();
        let model = ModelConfig::digits().init::<TestBackend>(&device);
        let classifier = DigitClassifier::from_model(model, ModelMetadata::new(0, 0, 0.0, None), device);
        DigitPad::new(DrawingCanvas::default(), Some(classifier))
    }

    #[test]
    fn test_blank_canvas_submit_is_well_formed() {
        let mut pad = pad_with_fresh_model();
        let prediction = pad.submit().unwrap();

        assert!(prediction.class < 10);
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert!(prediction.confidence_text().ends_with('%'));
        assert_eq!(pad.last_outcome(), Some(&Outcome::Prediction(prediction)));
    }

    #[test]
    fn test_drawn_digit_submit_is_well_formed() {
        let mut pad = pad_with_fresh_model();
        pad.pointer_moved(125.0, 40.0);
        pad.pointer_moved(125.0, 210.0);
        pad.pointer_released();

        let prediction = pad.submit().unwrap();
        assert!(prediction.class < 10);
        assert_eq!(prediction.probabilities.len(), 10);
    }

    #[test]
    fn test_clear_resets_canvas_and_outcome() {
        let mut pad = pad_with_fresh_model();
        pad.pointer_moved(10.0, 10.0);
        pad.pointer_moved(100.0, 100.0);
        pad.submit().unwrap();

        pad.clear();
        assert!(pad.canvas.is_blank());
        assert!(pad.last_outcome().is_none());
    }

    #[test]
    fn test_blank_state_follows_drawing() {
        let mut pad = pad_with_fresh_model();
        assert!(pad.canvas.is_blank());

        pad.pointer_moved(60.0, 60.0);
        assert!(pad.canvas.is_blank());
        pad.pointer_moved(90.0, 120.0);
        pad.pointer_released();
        assert!(!pad.canvas.is_blank());

        pad.clear();
        assert!(pad.canvas.is_blank());
    }

    #[test]
    fn test_submit_without_classifier_reports_error() {
        let mut pad: DigitPad<TestBackend> = DigitPad::new(DrawingCanvas::default(), None);
        assert!(!pad.has_classifier());
        assert!(pad.status().is_some());

        assert!(pad.submit().is_err());
        assert!(matches!(pad.last_outcome(), Some(Outcome::Error(_))));
    }
}
