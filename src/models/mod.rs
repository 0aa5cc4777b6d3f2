// Models module - Database entity representations

pub mod license_record;
pub mod license_request;

pub use license_record::{LicenseRecord, NewLicenseRecord, RecordFilter, Situacao};
pub use license_request::{LicenseRequest, NewLicenseRequest};
