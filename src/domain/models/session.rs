#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        return *self == SessionState::Authenticated;
    }
}

/// Views Presentation can ask to show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Route {
    Login,
    Register,
    Dashboard,
}

impl Route {
    pub fn is_protected(&self) -> bool {
        return *self == Route::Dashboard;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(Route),
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionEnd {
    LoggedOut,
    /// A protected call came back with an authorization failure.
    Rejected,
}
