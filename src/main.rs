#![allow(dead_code)]

use crate::dmrg::{dmrg_excited, dmrg_with_observer, DmrgArgs, DmrgObserver, DmrgOutcome};
use crate::io::{read_input, write_footer, write_header, Configuration};
use crate::utils::Timer;
use anyhow::{Context, Result};
use clap::{App, Arg};
use dmrg_chain::{Mpo, Mps, Sweeps};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

mod defaults;
mod dmrg;
mod io;
mod models;
mod utils;

#[macro_use]
extern crate clap;

fn main() -> Result<()> {
    // Input.
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about("two-site DMRG for ground and low-lying states of spin chains")
        .arg(
            Arg::new("config-File")
                .about("Sets the configuration file to use (default: dmrg.toml)")
                .required(false)
                .index(1),
        )
        .get_matches();
    let config: Configuration = read_input(matches.value_of("config-File"))?;

    // Multithreading.
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallelization.number_of_cores)
        .build_global()
        .context("Could not set up the thread pool")?;

    // Logging.
    // The log level is set.
    let log_level: LevelFilter = match config.verbose {
        2 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        0 => LevelFilter::Info,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    // and the logger is build.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, log_level)
        .init();

    // The program header is written to the command line.
    write_header();
    // and the total wall-time timer is started.
    let timer: Timer = Timer::start();

    // Computations.
    // ................................................................
    let mpo: Mpo = config.model.build_mpo()?;
    let sweeps: Sweeps = config.sweeps.build_sweeps();
    let args: DmrgArgs = config.dmrg_args()?;

    // The ground state is optimized first, every further state is kept orthogonal to
    // all states found before.
    let n_states: usize = config.excited.n_states.max(1);
    let mut states: Vec<Mps> = Vec::with_capacity(n_states);
    let mut energies: Vec<f64> = Vec::with_capacity(n_states);
    for state in 0..n_states {
        let mut psi: Mps = config.initial_state.build_state(&mpo, state as u64)?;
        let mut observer: DmrgObserver = config.build_observer()?;
        let outcome: DmrgOutcome = if states.is_empty() {
            dmrg_with_observer(&mut psi, &mpo, &sweeps, &mut observer, &args)
        } else {
            dmrg_excited(&mut psi, &mpo, &states, &sweeps, &mut observer, &args)
        }
        .with_context(|| format!("DMRG failed for state {}", state))?;
        energies.push(outcome.energy);
        states.push(psi);
    }

    info!("{:-^80}", "");
    info!("{: ^80}", "Energies");
    info!("{:-^80}", "");
    for (state, energy) in energies.iter().enumerate() {
        info!("State {:>4}: {:18.14}", state, energy);
    }
    info!("{:-^80}", "");
    // ................................................................

    // Finished.
    // The total wall-time is printed together with the end statement.
    write_footer(timer);
    Ok(())
}
