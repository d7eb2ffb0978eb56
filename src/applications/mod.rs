//! Job applications: the record model and read-side listing.

pub mod listing;
pub mod model;

pub use listing::{list_applications, linked_emails_for_user, ApplicationList, ApplicationSelector};
pub use model::{
    ApplicantInfo, ApplicationPatch, ApplicationStatus, JobApplication, StoredApplication,
    TimelineItem,
};
