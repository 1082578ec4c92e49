use std::sync::Arc;

use anyhow::Context;

use vibwa::{
    compute::ShaderCode,
    task::{ComputeDeviceInterface, HardwareConfig, MorsePotentialConfig, TaskOutcome},
    vulkan::{DeviceOptions, version_to_string},
};

const GROUP_SIZE: u32 = 16;
const POINT_COUNT: u32 = 1024;

fn main() -> anyhow::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default())
        .context("failed to load logging config file")?;

    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default()),
        )
        .context("failed to install tracy subscriber")?;
    }

    let interface = ComputeDeviceInterface::create(DeviceOptions::default())
        .context("failed to create compute device")?;
    let device = interface.device();
    log::info!(
        "Using {:?} (Vulkan {}), scaling policy {}",
        device.properties().device_name_as_c_str().unwrap_or_default(),
        version_to_string(device.api_version()),
        device.optimal_scaling_policy(GROUP_SIZE)
    );

    let Some(path) = std::env::args().nth(1) else {
        log::info!("No shader given, nothing to run");
        return Ok(());
    };
    let shader = Arc::new(ShaderCode::from_file(&path)?);

    let potentials = (0..GROUP_SIZE)
        .map(|i| MorsePotentialConfig {
            dissociation_energy: 0.1 + 0.01 * i as f32,
            equilibrium_bond_distance: 2.0,
            well_width: 1.2,
            min_r: 1.0,
            max_r: 12.0,
            point_count: POINT_COUNT,
        })
        .collect();

    let mut configurator = interface.task_configurator::<f32>();
    configurator
        .set_hardware_config(HardwareConfig::new(POINT_COUNT, GROUP_SIZE, 64))
        .set_morse_potential(potentials)
        .set_vibwa_algorithm(1.0, 1.0, 0.001, 10.0, 0, 15, shader);

    let mut handle = interface.submit_task(&configurator)?;
    log::info!("Task {}: {}", handle.id(), handle.status_message());

    match handle.wait()? {
        TaskOutcome::Completed(results) => {
            for (batch_index, levels) in results.levels.iter().enumerate() {
                log::info!("batch {batch_index}: {} level(s)", levels.len());
            }
        }
        TaskOutcome::Cancelled => log::warn!("Task {} was cancelled", handle.id()),
    }

    Ok(())
}
