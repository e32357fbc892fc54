use burn::tensor::backend::Backend;
use eframe::egui::{self, Color32, Pos2, Rect, RichText, Sense, Vec2};

use crate::app::{DigitPad, Outcome};

/// 右側のパネル（送信・クリアボタンと結果表示）
pub fn draw_side_panel<B: Backend>(app: &mut DigitPad<B>, ctx: &egui::Context) {
    egui::SidePanel::right("controls_panel")
        .resizable(false)
        .min_width(140.0)
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);

                let submit = ui.add_enabled(
                    app.has_classifier(),
                    egui::Button::new("Submit").min_size(Vec2::new(110.0, 28.0)),
                );
                if submit.clicked() {
                    if let Err(e) = app.submit() {
                        log::debug!("送信エラー: {:#}", e);
                    }
                }

                if ui
                    .add(egui::Button::new("Clear").min_size(Vec2::new(110.0, 28.0)))
                    .clicked()
                {
                    app.clear();
                }

                ui.separator();
                draw_outcome(app, ui);

                if app.canvas.is_blank() {
                    ui.label(RichText::new("キャンバスに数字を描いてください").weak());
                }

                if let Some(status) = app.status() {
                    ui.separator();
                    ui.label(RichText::new(status).color(Color32::YELLOW));
                }
            });
        });
}

fn draw_outcome<B: Backend>(app: &DigitPad<B>, ui: &mut egui::Ui) {
    match app.last_outcome() {
        Some(Outcome::Prediction(prediction)) => {
            ui.label(RichText::new(prediction.label_text()).size(56.0).strong());
            ui.label(RichText::new(prediction.confidence_text()).size(20.0));
        }
        Some(Outcome::Error(message)) => {
            ui.label(RichText::new(message).color(Color32::LIGHT_RED));
        }
        None => {
            ui.label(RichText::new("-").size(56.0).weak());
        }
    }
}

/// 中央のキャンバス
pub fn draw_central_panel<B: Backend>(app: &mut DigitPad<B>, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let canvas_size = app.canvas.size() as f32;
        let (response, painter) = ui.allocate_painter(Vec2::splat(canvas_size), Sense::drag());

        // 画面座標 -> キャンバス座標（表示倍率が1でない場合も考慮）
        let scale = canvas_size / response.rect.width().max(1.0);
        if response.dragged() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let local = (pointer - response.rect.min) * scale;
                app.pointer_moved(local.x, local.y);
            }
        }
        if response.drag_stopped() {
            app.pointer_released();
        }

        let texture = app.canvas_texture(ctx);
        painter.image(
            texture,
            response.rect,
            Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
    });
}
