use anyhow::{anyhow, Result};
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::Drawable,
    Connection,
};

use super::IdleProbe;

/// Reads idle time through the X screensaver extension.
pub struct X11IdleProbe {
    connection: Connection,
    preferred_screen: i32,
}

impl X11IdleProbe {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect_with_extensions(
            None,
            &[xcb::Extension::ScreenSaver],
            &[],
        )?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }
}

impl IdleProbe for X11IdleProbe {
    #[instrument(skip(self))]
    fn idle_time(&mut self) -> Result<u32> {
        let setup = self.connection.get_setup();
        // Currently only 1 x11 screen is supported.
        let root = setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .ok_or_else(|| anyhow!("Screen {} is missing", self.preferred_screen))?
            .root();
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(reply.ms_since_user_input())
    }
}
