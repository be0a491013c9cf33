//! Join videos end to end with the concat demuxer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use vapi_models::TaskArguments;
use vapi_queue::{TaskContext, TaskHandler};

use super::args::required_str_list;
use super::MediaContext;
use crate::command::FfmpegCommand;
use crate::error::MediaError;

/// Concat demuxer list file contents.
fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

fn build_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], list)
        .copy_streams()
}

pub struct ConcatenateHandler {
    ctx: Arc<MediaContext>,
}

impl ConcatenateHandler {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for ConcatenateHandler {
    async fn run(&self, task: TaskContext, args: TaskArguments) -> anyhow::Result<Value> {
        let urls = required_str_list(&args, "video_urls")?;
        if urls.len() < 2 {
            return Err(MediaError::invalid_argument("video_urls needs at least 2 entries").into());
        }

        let workspace = self.ctx.workspace(&task.job_id).await?;
        let dir = workspace.path();
        let mut inputs = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let path = self
                .ctx
                .downloader
                .download(url, dir, &format!("part_{i:03}"))
                .await?;
            inputs.push(path);
        }
        info!(job_id = %task.job_id, parts = inputs.len(), "Inputs downloaded, concatenating");

        let list = dir.join("concat_list.txt");
        tokio::fs::write(&list, concat_list(&inputs)).await?;

        let output = dir.join("concatenated.mp4");
        self.ctx.runner.run(&build_command(&list, &output)).await?;

        Ok(self.ctx.publish(&task.job_id, &output).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_command_uses_concat_demuxer() {
        let args = build_command(Path::new("list.txt"), Path::new("out.mp4")).build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i list.txt -c copy out.mp4"));
    }

    #[tokio::test]
    async fn test_single_video_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let handler = ConcatenateHandler::new(super::super::test_support::context(&dir));
        let task = TaskContext {
            job_id: "j".into(),
            callback_address: None,
        };
        let args = json!({"video_urls": ["http://x/a.mp4"]}).as_object().cloned().unwrap();

        let err = handler.run(task, args).await.unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }
}
