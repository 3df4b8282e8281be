//! Wire format of dispatch and result messages.
//!
//! Dispatch payloads are a JSON array of tasks (possibly empty) or the JSON
//! literal `null`, which marks the end of a worker's stream. Result payloads
//! are a single JSON object per task.

use fleet_core::{CoreError, Task, TaskResult};

/// Payload of the end-of-stream sentinel.
pub const END_OF_STREAM: &[u8] = b"null";

/// A decoded message on a worker's dispatch topic.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchMessage {
    Tasks(Vec<Task>),
    EndOfStream,
}

pub fn encode_task_list(tasks: &[Task]) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(tasks).map_err(|e| CoreError::InvalidPayload(format!("task list: {e}")))
}

pub fn encode_end_of_stream() -> Vec<u8> {
    END_OF_STREAM.to_vec()
}

pub fn decode_dispatch(payload: &[u8]) -> Result<DispatchMessage, CoreError> {
    let decoded: Option<Vec<Task>> = serde_json::from_slice(payload)
        .map_err(|e| CoreError::InvalidPayload(format!("task list: {e}")))?;
    Ok(match decoded {
        Some(tasks) => DispatchMessage::Tasks(tasks),
        None => DispatchMessage::EndOfStream,
    })
}

pub fn encode_result(result: &TaskResult) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(result).map_err(|e| CoreError::InvalidPayload(format!("result: {e}")))
}

pub fn decode_result(payload: &[u8]) -> Result<TaskResult, CoreError> {
    serde_json::from_slice(payload).map_err(|e| CoreError::InvalidPayload(format!("result: {e}")))
}
