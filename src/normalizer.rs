//! キャプチャ画像をモデル入力テンソルへ変換する
//!
//! キャンバスのキャプチャ（任意サイズ、グレースケールを各チャネルに複製した画像）を
//! 28x28 にリサイズし、1チャネルを取り出して 0〜1 に正規化します。
//! ファイルを経由せずメモリ上で完結します。

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;

use crate::types::{InputTensor, INPUT_SIZE, PIXEL_SCALE};

/// リサイズに使う補間方式（バイキュービック）
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// メモリ上の画像を正規化
///
/// # 戻り値
/// - 形状 `[1, 28, 28, 1]`、値域 `[0, 1]` のテンソル
///
/// # エラー
/// - 画像の幅または高さが 0 の場合
pub fn normalize_image(image: &DynamicImage) -> Result<InputTensor> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        anyhow::bail!("キャプチャ画像が空です: {}x{}", width, height);
    }

    let size = INPUT_SIZE as u32;
    let resized = if width == size && height == size {
        image.to_rgba8()
    } else {
        image::imageops::resize(&image.to_rgba8(), size, size, RESIZE_FILTER)
    };

    // 各チャネルは同じ値なので先頭チャネルだけを使う
    let data: Vec<f32> = resized
        .pixels()
        .map(|pixel| pixel[0] as f32 / PIXEL_SCALE)
        .collect();

    InputTensor::from_values(data)
}

/// エンコード済み画像（PNG など）をデコードして正規化
pub fn normalize_encoded(bytes: &[u8]) -> Result<InputTensor> {
    if bytes.is_empty() {
        anyhow::bail!("キャプチャ画像のデータが空です");
    }
    let image = image::load_from_memory(bytes).context("キャプチャ画像のデコードに失敗しました")?;
    normalize_image(&image)
}
