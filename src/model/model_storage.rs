//! モデルとメタデータの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（入力サイズ、学習条件など）
//! - model.bin       - モデルの重み（バイナリ）

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder};

use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 親ディレクトリが無ければ作成します。
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
    }

    let tar_gz_file = File::create(output_path)
        .context(format!("Failed to create tar.gz file: {:?}", output_path))?;

    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // tar と gzip の両方を閉じる
    tar_builder
        .into_inner()
        .context("Failed to finalize tar archive")?
        .finish()
        .context("Failed to finalize gzip stream")?;

    log::info!(
        "モデルを保存しました: {} ({:.2} MB)",
        output_path.display(),
        model_binary.len() as f64 / 1024.0 / 1024.0
    );
    Ok(())
}

fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))
}

/// Tar.gzからモデルメタデータを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_str() == Some(METADATA_ENTRY) {
            let mut json_str = String::new();
            entry.read_to_string(&mut json_str)?;
            return ModelMetadata::from_json_string(&json_str);
        }
    }

    Err(anyhow::anyhow!("metadata.json not found in tar.gz archive"))
}

/// メタデータとモデルバイナリを共に読み込む
pub fn load_model_with_metadata(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let mut archive = open_archive(tar_gz_path)?;

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        match path.to_str() {
            Some(METADATA_ENTRY) => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            Some(MODEL_ENTRY) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(anyhow::anyhow!("metadata.json not found in tar.gz archive")),
        (_, None) => Err(anyhow::anyhow!("model.bin not found in tar.gz archive")),
    }
}

fn open_archive(tar_gz_path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let tar_gz_file = File::open(tar_gz_path)
        .context(format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;
    Ok(Archive::new(GzDecoder::new(tar_gz_file)))
}

/// メタデータをログに出力
pub fn print_metadata_info(metadata: &ModelMetadata) {
    log::info!("=== モデルメタデータ ===");
    log::info!("入力サイズ: {}x{}", metadata.image_size, metadata.image_size);
    log::info!("クラス数: {}", metadata.num_classes);
    log::info!("学習エポック数: {}", metadata.num_epochs);
    log::info!("バッチサイズ: {}", metadata.batch_size);
    log::info!("学習率: {}", metadata.learning_rate);
    if let Some(accuracy) = metadata.test_accuracy {
        log::info!("テスト正解率: {:.2}%", accuracy * 100.0);
    }
    log::info!("学習日時: {}", metadata.trained_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("digit_pad_storage_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_archive_keeps_metadata_and_binary() {
        let path = temp_path("roundtrip.tar.gz");
        let metadata = ModelMetadata::new(2, 100, 1e-3, Some(0.975));
        let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        save_model_with_metadata(&path, &metadata, &binary).unwrap();

        let (loaded_metadata, loaded_binary) = load_model_with_metadata(&path).unwrap();
        assert_eq!(loaded_metadata, metadata);
        assert_eq!(loaded_binary, binary);
        assert_eq!(load_metadata(&path).unwrap(), metadata);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_model_entry_is_an_error() {
        let path = temp_path("metadata_only.tar.gz");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let file = File::create(&path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        let json = ModelMetadata::new(1, 10, 1e-3, None).to_json_string().unwrap();
        append_entry(&mut builder, METADATA_ENTRY, json.as_bytes()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = load_model_with_metadata(&path).unwrap_err();
        assert!(err.to_string().contains("model.bin"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_model_with_metadata(&temp_path("does_not_exist.tar.gz")).is_err());
    }
}
