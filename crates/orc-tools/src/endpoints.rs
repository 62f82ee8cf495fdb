use orc_core::config::ScheduleBackendKind;

/// Availability, booking, and delete paths for a schedule backend kind
/// (§6: generic/google_calendar are fully specified; calendly/webhook are
/// "contract-compatible alternates").
pub struct BackendPaths {
    pub availability: &'static str,
    pub book: &'static str,
    pub delete: &'static str,
    /// Whether requests carry an `{"action": "..."}` discriminator instead
    /// of hitting distinct paths (the `webhook` kind).
    pub single_endpoint: bool,
}

pub fn paths_for(kind: ScheduleBackendKind) -> BackendPaths {
    match kind {
        ScheduleBackendKind::Generic => BackendPaths {
            availability: "/check-availability",
            book: "/schedule-request",
            delete: "/delete-event",
            single_endpoint: false,
        },
        ScheduleBackendKind::GoogleCalendar => BackendPaths {
            availability: "/calendar/availability",
            book: "/calendar/book",
            delete: "/calendar/delete",
            single_endpoint: false,
        },
        ScheduleBackendKind::Calendly => BackendPaths {
            availability: "/calendly/availability",
            book: "/calendly/book",
            delete: "/calendly/delete",
            single_endpoint: false,
        },
        ScheduleBackendKind::Webhook => BackendPaths {
            availability: "",
            book: "",
            delete: "",
            single_endpoint: true,
        },
    }
}
