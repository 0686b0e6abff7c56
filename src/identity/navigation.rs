//! Screen routing as a function of the authentication state

use serde::{Deserialize, Serialize};

use super::AuthState;

/// Screens of the app
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Login,
    Monitor,
    History,
}

/// The screen to show for `requested` under `state`.
///
/// Signed-out users only ever see the login screen; signed-in users never do.
pub fn route(state: &AuthState, requested: Screen) -> Screen {
    match (state, requested) {
        (AuthState::SignedOut, _) => Screen::Login,
        (AuthState::SignedIn { .. }, Screen::Login) => Screen::Monitor,
        (AuthState::SignedIn { .. }, screen) => screen,
    }
}

/// Back stack of the signed-in part of the app
#[derive(Clone, Debug, Default)]
pub struct Navigator {
    stack: Vec<Screen>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigate(&mut self, screen: Screen) {
        if self.stack.last() != Some(&screen) {
            self.stack.push(screen);
        }
    }

    /// Pop one screen. Returns false when already at the start.
    pub fn back(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
    }

    /// Follow an auth state change; signing out drops the back stack.
    pub fn on_auth_change(&mut self, state: &AuthState) {
        if !state.is_signed_in() {
            self.reset();
        }
    }

    /// What to show now
    pub fn current(&self, state: &AuthState) -> Screen {
        route(state, self.stack.last().copied().unwrap_or(Screen::Monitor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> AuthState {
        AuthState::SignedIn {
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_route_is_gated_by_auth() {
        assert_eq!(route(&AuthState::SignedOut, Screen::History), Screen::Login);
        assert_eq!(route(&signed_in(), Screen::Login), Screen::Monitor);
        assert_eq!(route(&signed_in(), Screen::History), Screen::History);
    }

    #[test]
    fn test_back_stack() {
        let mut nav = Navigator::new();
        assert_eq!(nav.current(&signed_in()), Screen::Monitor);

        nav.navigate(Screen::History);
        nav.navigate(Screen::History);
        assert_eq!(nav.current(&signed_in()), Screen::History);
        assert_eq!(nav.current(&AuthState::SignedOut), Screen::Login);

        assert!(nav.back());
        assert_eq!(nav.current(&signed_in()), Screen::Monitor);
        assert!(!nav.back());
    }

    #[test]
    fn test_sign_out_clears_stack() {
        let mut nav = Navigator::new();
        nav.navigate(Screen::History);

        nav.on_auth_change(&signed_in());
        assert_eq!(nav.current(&signed_in()), Screen::History);

        nav.on_auth_change(&AuthState::SignedOut);
        assert_eq!(nav.current(&signed_in()), Screen::Monitor);
    }
}
