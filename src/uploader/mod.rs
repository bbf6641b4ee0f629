// 上传模块
//
// 数据流：用户选择 → 校验 → 缩略图 → 入队 → 按并发上限提升为活跃
// → 模拟传输推进进度 → 完成后写入记录存储并移出活跃列表

pub mod events;
pub mod manager;
pub mod session;
pub mod simulator;
pub mod store;
pub mod task;
pub mod thumbnail;
pub mod validator;

pub use events::{UploadEvent, EVENT_CHANNEL_CAPACITY};
pub use manager::{EnqueueReport, Rejection, UploadQueueManager, UploadStats};
pub use session::{LoadState, UploadSession};
pub use simulator::{TransferError, UploadOutcome, UploadSimulator};
pub use store::{CompletedUpload, StoreError, UploadRecord, UploadRecordStore, MAX_UPLOAD_RECORDS};
pub use task::{QueuedFile, SelectedFile, UploadStatus};
pub use thumbnail::{thumbnail_dimensions, ThumbnailError, ThumbnailGenerator, THUMBNAIL_MAX_SIZE};
pub use validator::{validate, ValidationError};
