use std::sync::Arc;

use crate::types::HealingEvent;

pub type ProgressCallback = Arc<dyn Fn(&HealingEvent) + Send + Sync>;

pub(crate) fn emit(progress: Option<&ProgressCallback>, event: HealingEvent) {
    if let Some(callback) = progress {
        callback(&event);
    }
}
