//! Live preview command.
//!
//! Binds the HTTP server first so early requests get the loading page,
//! then runs the mirror actor on its own runtime thread while the
//! request loop occupies the main thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;

use crate::config::Config;
use crate::mirror::MirrorActor;
use crate::mirror::overrides::OverrideCache;
use crate::reload::ReloadBus;
use crate::serve::{self, RenderClient, ServeContext};

pub fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let overrides = Arc::new(OverrideCache::new());
    let bus = Arc::new(ReloadBus::new());
    let render = RenderClient::new(&config.serve.render_url)?;

    let bound = serve::bind_server(&config)?;

    let actor = MirrorActor::new(
        Arc::clone(&config),
        Arc::clone(&overrides),
        Arc::clone(&bus),
        bound.shutdown_rx(),
    )?;
    let actor_handle = spawn_actor(actor);

    bound.run(Arc::new(ServeContext {
        config,
        overrides,
        bus,
        render,
    }));

    wait_for_shutdown(actor_handle);
    Ok(())
}

/// Run the mirror actor on a dedicated runtime thread.
fn spawn_actor(actor: MirrorActor) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");
        rt.block_on(actor.run());
    })
}

/// Wait for the mirror actor to shut down gracefully (max 2 seconds).
fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(std::time::Duration::from_millis(50));
    }
}
