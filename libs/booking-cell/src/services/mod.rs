pub mod ledger;
pub mod notification;
pub mod scheduler;
pub mod workflow;

pub use ledger::BookingLedger;
pub use notification::{
    send_appointment_notification, ConsoleDispatcher, NotificationDispatcher, NotificationKind,
    NotificationPayload,
};
pub use scheduler::NotificationScheduler;
pub use workflow::{BookingService, BookingWorkflow};
