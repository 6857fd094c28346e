use super::types::{CheckpointError, CheckpointRecord};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Repository for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointRepository: Send + Sync {
	/// Durably append one record. Must not return before the record is persisted.
	async fn append(&mut self, record: &CheckpointRecord) -> Result<(), CheckpointError>;

	/// Every record ever appended, oldest first.
	async fn load_all(&self) -> Result<Vec<CheckpointRecord>, CheckpointError>;
}

/// File-based implementation of CheckpointRepository
///
/// Writes one JSON object per line and syncs each append to disk. A process killed
/// mid-write leaves at most a torn final line, which loading skips and the first append
/// after a restart truncates away.
pub struct FileCheckpointRepository {
	path: PathBuf,
	file: Option<tokio::fs::File>,
}

impl FileCheckpointRepository {
	pub fn new(path: PathBuf) -> Self {
		Self { path, file: None }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn io_error(&self, source: std::io::Error) -> CheckpointError {
		CheckpointError::Io {
			path: self.path.display().to_string(),
			source,
		}
	}

	async fn open_for_append(&self) -> Result<tokio::fs::File, CheckpointError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|e| self.io_error(e))?;
		}

		let file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)
			.await
			.map_err(|e| self.io_error(e))?;

		// Drop a torn line left by a crash; the file must end on a record boundary.
		let content = tokio::fs::read(&self.path)
			.await
			.map_err(|e| self.io_error(e))?;
		if content.last().is_some_and(|last| *last != b'\n') {
			let keep = content
				.iter()
				.rposition(|byte| *byte == b'\n')
				.map_or(0, |newline| newline + 1);
			warn!(
				"Checkpoint {:?} ends with a partial line, truncating {} byte(s)",
				self.path,
				content.len() - keep
			);
			file.set_len(keep as u64)
				.await
				.map_err(|e| self.io_error(e))?;
			file.sync_data().await.map_err(|e| self.io_error(e))?;
		}

		info!("Opened checkpoint ledger {:?}", self.path);
		Ok(file)
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for FileCheckpointRepository {
	async fn append(&mut self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
		let mut line = serde_json::to_string(record)?;
		line.push('\n');

		let opened = match self.file.take() {
			Some(file) => file,
			None => self.open_for_append().await?,
		};
		let path = self.path.display().to_string();
		let io_error = |source| CheckpointError::Io {
			path: path.clone(),
			source,
		};
		let file = self.file.insert(opened);

		file.write_all(line.as_bytes()).await.map_err(io_error)?;
		file.flush().await.map_err(io_error)?;
		file.sync_data().await.map_err(io_error)?;
		Ok(())
	}

	async fn load_all(&self) -> Result<Vec<CheckpointRecord>, CheckpointError> {
		let content = match tokio::fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(self.io_error(e)),
		};

		let complete = content.ends_with('\n');
		let lines: Vec<&str> = content.lines().collect();
		let mut records = Vec::with_capacity(lines.len());

		for (position, line) in lines.iter().enumerate() {
			if line.trim().is_empty() {
				continue;
			}
			match serde_json::from_str::<CheckpointRecord>(line) {
				Ok(record) => records.push(record),
				Err(e) if position + 1 == lines.len() && !complete => {
					warn!(
						"Ignoring torn final line {} of checkpoint {:?}: {}",
						position + 1,
						self.path,
						e
					);
				}
				Err(e) => {
					return Err(CheckpointError::Corrupt {
						path: self.path.display().to_string(),
						line: position + 1,
						reason: e.to_string(),
					});
				}
			}
		}

		info!(
			"Loaded {} checkpoint records from {:?}",
			records.len(),
			self.path
		);
		Ok(records)
	}
}
