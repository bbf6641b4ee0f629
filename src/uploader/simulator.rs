// 模拟上传
//
// 不传输任何字节：按随机间隔推进进度，到达 100 后等待固定收尾延迟，
// 返回由文件名拼出的目标地址。支持取消令牌与可配置的失败注入

use crate::config::SimulatorConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 传输错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Upload cancelled")]
    Cancelled,

    #[error("Upload failed: connection interrupted at {progress}%")]
    Interrupted { progress: u8 },
}

/// 模拟上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub url: String,
}

/// 模拟上传器
#[derive(Debug)]
pub struct UploadSimulator {
    config: SimulatorConfig,
    /// 每次上传派生独立的随机数种子，保证固定种子下结果可复现
    seed_counter: AtomicU64,
}

impl UploadSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            seed_counter: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// 合成目标地址（不做 URL 编码，同名文件地址相同）
    pub fn destination_url(&self, file_name: &str) -> String {
        format!("{}{}", self.config.base_url, file_name)
    }

    /// 模拟上传一个文件
    ///
    /// 每个间隔回调一次向下取整的进度；最后一次回调恰好为 100，且只回调一次
    ///
    /// # 参数
    /// * `file_name` - 文件名，用于合成目标地址
    /// * `on_progress` - 进度回调
    /// * `cancel_token` - 取消令牌，取消后不再回调
    pub async fn upload<F>(
        &self,
        file_name: &str,
        mut on_progress: F,
        cancel_token: CancellationToken,
    ) -> Result<UploadOutcome, TransferError>
    where
        F: FnMut(u8) + Send,
    {
        let mut rng = self.make_rng();
        let fail_at = self.pick_failure_point(&mut rng);
        let mut progress = 0.0_f64;

        loop {
            let delay = self.next_tick_delay(&mut rng);
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("模拟上传已取消: {}", file_name);
                    return Err(TransferError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            progress += rng.gen::<f64>() * self.config.max_increment;

            if let Some(fail_at) = fail_at {
                if progress >= fail_at {
                    let reached = fail_at.floor().min(99.0) as u8;
                    on_progress(reached);
                    debug!("模拟上传失败: {}, 进度 {}%", file_name, reached);
                    return Err(TransferError::Interrupted { progress: reached });
                }
            }

            if progress >= 100.0 {
                on_progress(100);
                break;
            }

            on_progress(progress.floor() as u8);
        }

        let url = self.destination_url(file_name);

        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("模拟上传在收尾阶段被取消: {}", file_name);
                return Err(TransferError::Cancelled);
            }
            _ = tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)) => {}
        }

        Ok(UploadOutcome { success: true, url })
    }

    fn make_rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => {
                let n = self.seed_counter.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(seed.wrapping_add(n))
            }
            None => StdRng::from_entropy(),
        }
    }

    /// 决定本次上传是否失败，失败时返回触发失败的进度点
    fn pick_failure_point(&self, rng: &mut StdRng) -> Option<f64> {
        let rate = self.config.failure_rate.clamp(0.0, 1.0);
        if rate > 0.0 && rng.gen_bool(rate) {
            Some(rng.gen_range(0.0..100.0))
        } else {
            None
        }
    }

    /// 间隔在 [tick_min_ms, tick_max_ms) 内随机
    fn next_tick_delay(&self, rng: &mut StdRng) -> Duration {
        let min = self.config.tick_min_ms;
        let max = self.config.tick_max_ms;
        let ms = if max > min { rng.gen_range(min..max) } else { min };
        Duration::from_millis(ms)
    }
}

impl Default for UploadSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}
