//! 手書き入力用のキャンバス
//!
//! 黒背景の正方形に白いペンで線を描きます。
//! GUI 側はポインタの移動・解放をこの構造体に通知するだけで、
//! 描画結果はメモリ上のビットマップとして取り出せます。

use image::{GrayImage, Luma, Rgba, RgbaImage};

const BACKGROUND: Luma<u8> = Luma([0]);
const INK: Luma<u8> = Luma([255]);

/// 描画キャンバス
pub struct DrawingCanvas {
    pixels: GrayImage,
    pen_width: u32,
    last_point: Option<(f32, f32)>,
}

impl DrawingCanvas {
    /// 指定サイズの黒いキャンバスを作成
    pub fn new(size: u32, pen_width: u32) -> Self {
        Self {
            pixels: GrayImage::from_pixel(size, size, BACKGROUND),
            pen_width: pen_width.max(1),
            last_point: None,
        }
    }

    pub fn size(&self) -> u32 {
        self.pixels.width()
    }

    /// 現在の画素（グレースケール）
    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    /// ポインタ移動（ボタン押下中）
    ///
    /// ストローク開始直後の1回目は位置を記録するだけで、
    /// 2回目以降は直前の位置から線を引く
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if let Some((last_x, last_y)) = self.last_point {
            self.draw_line(last_x, last_y, x, y);
        }
        self.last_point = Some((x, y));
    }

    /// ポインタ解放（ストローク終了）
    pub fn pointer_released(&mut self) {
        self.last_point = None;
    }

    /// 全面を黒で塗りつぶす
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = BACKGROUND;
        }
        self.last_point = None;
    }

    /// 何も描かれていないか（UIの案内表示に使う）
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| *p == BACKGROUND)
    }

    /// 現在の描画内容をRGBAビットマップとして取得
    ///
    /// RGB は同じ値、アルファは常に 255
    pub fn capture(&self) -> RgbaImage {
        RgbaImage::from_fn(self.pixels.width(), self.pixels.height(), |x, y| {
            let v = self.pixels.get_pixel(x, y)[0];
            Rgba([v, v, v, 255])
        })
    }

    /// 丸ペンで線分を描く（円を1ピクセル刻みで打つ）
    fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32) {
        let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = length.ceil().max(1.0) as u32;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
        }
    }

    fn stamp(&mut self, cx: f32, cy: f32) {
        let radius = self.pen_width as f32 / 2.0;
        let (width, height) = self.pixels.dimensions();

        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = (cx + radius).ceil().min(width as f32 - 1.0);
        let max_y = (cy + radius).ceil().min(height as f32 - 1.0);
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }

        for y in min_y..=max_y as u32 {
            for x in min_x..=max_x as u32 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    self.pixels.put_pixel(x, y, INK);
                }
            }
        }
    }
}

impl Default for DrawingCanvas {
    fn default() -> Self {
        Self::new(250, 20)
    }
}
