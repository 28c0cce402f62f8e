mod demo;

use anyhow::Result;
use pixelpipe_engine::device::GpuInit;
use pixelpipe_engine::logging::{init_logging, LoggingConfig};
use pixelpipe_engine::window::{Runtime, RuntimeConfig};

use demo::Demo;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    log::info!("left click: swap to the small scene at 320x240 | R: restart | E: export | Esc: quit");

    Runtime::run(
        RuntimeConfig {
            title: "pixelpipe".to_string(),
            ..Default::default()
        },
        GpuInit::default(),
        Demo::default(),
    )
}
