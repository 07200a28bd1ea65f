mod application;
mod logging;
mod presentation;

use webpz_core::error::Result;

fn main() -> Result<()> {
    application::run()
}
