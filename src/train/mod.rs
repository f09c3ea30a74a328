pub mod early_stopping;
pub mod epoch_stats;
pub mod loop_fn;
pub mod train_config;
pub mod trainer;

pub use early_stopping::{EarlyStopper, EarlyStoppingState, StopStatus};
pub use epoch_stats::{EpochStats, TrainingHistory};
pub use loop_fn::{train_epoch, validate, PassSummary};
pub use train_config::{TrainConfig, Verbosity};
pub use trainer::fit;
