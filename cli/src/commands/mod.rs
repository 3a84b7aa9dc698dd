mod analyze;
mod backup;
mod entry;
mod goal;
mod helpers;
mod key;
mod summary;

pub(crate) use analyze::cmd_analyze;
pub(crate) use backup::{
    cmd_backup_export, cmd_backup_import, cmd_backup_snooze, cmd_backup_status,
};
pub(crate) use entry::{EntryFields, cmd_add, cmd_clear, cmd_delete, cmd_edit};
pub(crate) use goal::{cmd_goal_set, cmd_goal_show};
pub(crate) use key::{cmd_key_clear, cmd_key_set, cmd_key_show};
pub(crate) use summary::{cmd_list, cmd_review};
