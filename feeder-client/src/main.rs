use std::fmt;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use feeder_client::FeederError;
use feeder_client::config::{FeederConfig, PollConfig};
use feeder_client::domain::{DEFAULT_FREE_SEATS, LatLng, RideRequestId, Role, StationId};
use feeder_client::services::{Backend, HttpBackend, MockBackend, Registration};
use feeder_client::session::{Session, SessionSlot, SessionStore};
use feeder_client::views::{AdminDashboard, DriverDashboard, RiderDashboard};

#[derive(Parser)]
#[command(name = "feeder", about = "Metro feeder ride-sharing client")]
struct Cli {
    /// Run against an in-memory demo world instead of the services. The world
    /// lives for one invocation, so only `login`, `logout`, `whoami` and
    /// `watch` are accepted
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log into it
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "rider")]
        role: Role,
    },
    Logout,
    /// Show the current session
    Whoami,
    /// Open the dashboard for the session's role and print it as it changes
    Watch,
    /// Add a metro station (admin)
    #[command(allow_negative_numbers = true)]
    AddStation { name: String, lat: f64, lng: f64 },
    /// Ask for a pickup at a station (rider)
    #[command(allow_negative_numbers = true)]
    RequestRide {
        station: i64,
        /// Arrival time at the station, HH:MM
        eta: String,
        lat: f64,
        lng: f64,
    },
    /// Withdraw a ride request that is still LOOKING (rider)
    CancelRide { ride: i64 },
    /// Register as a driver with a route of at least two `lat,lng` points
    CreateDriver {
        #[arg(long, default_value_t = i64::from(DEFAULT_FREE_SEATS))]
        seats: i64,
        #[arg(required = true, allow_hyphen_values = true, value_parser = parse_point)]
        waypoints: Vec<LatLng>,
    },
    /// Start the route simulation (driver)
    Start,
    /// Stop the route simulation (driver)
    Stop,
}

impl Command {
    /// Intents whose effect a per-process demo world would lose on exit.
    fn writes_backend(&self) -> bool {
        matches!(
            self,
            Command::Register { .. }
                | Command::AddStation { .. }
                | Command::RequestRide { .. }
                | Command::CancelRide { .. }
                | Command::CreateDriver { .. }
                | Command::Start
                | Command::Stop
        )
    }
}

fn parse_point(s: &str) -> Result<LatLng, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lng, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    LatLng::new(lat, lng).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feeder_client=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.mock && cli.command.writes_backend() {
        eprintln!("error: the --mock world does not outlive this command; use it with watch");
        return ExitCode::FAILURE;
    }
    let config = FeederConfig::from_env();

    let result = if cli.mock {
        let mock = MockBackend::demo();
        spawn_demo_engine(mock.clone(), &config);
        run(Arc::new(mock), &config, cli.command).await
    } else {
        match HttpBackend::new(&config) {
            Ok(http) => run(Arc::new(http), &config, cli.command).await,
            Err(e) => Err(e.into()),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Step the demo world's engine and matcher at the poll cadence.
fn spawn_demo_engine(mock: MockBackend, config: &FeederConfig) {
    let period = config.poll_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            mock.tick_engine();
            mock.match_waiting_riders();
        }
    });
}

async fn run<B: Backend>(
    backend: Arc<B>,
    config: &FeederConfig,
    command: Command,
) -> Result<(), FeederError> {
    let mut slot = SessionSlot::restore(SessionStore::new(&config.session_file));
    let poll = PollConfig::from(config);

    match command {
        Command::Login { username, password } => {
            let session = slot.login(&*backend, &username, &password).await?;
            println!("Logged in as {} ({})", session.username, session.role);
        }
        Command::Register {
            username,
            email,
            password,
            role,
        } => {
            let registration = Registration {
                username,
                email,
                password,
                role,
            };
            let session = slot.register_and_login(&*backend, registration).await?;
            println!(
                "Registered and logged in as {} ({})",
                session.username, session.role
            );
        }
        Command::Logout => {
            slot.logout()?;
            println!("Logged out");
        }
        Command::Whoami => match slot.current() {
            Some(s) => println!("{} ({}), user {}", s.username, s.role, s.user_id),
            None => println!("Not logged in"),
        },
        Command::Watch => {
            let session = slot.require()?.clone();
            watch(backend, session, poll).await?;
        }
        Command::AddStation { name, lat, lng } => {
            let dash = AdminDashboard::open(backend, slot.require()?.clone(), poll).await?;
            let result = dash.create_station(&name, lat, lng).await;
            dash.close().await;
            let station = result?;
            println!("Created station {} ({})", station.name, station.id);
        }
        Command::RequestRide {
            station,
            eta,
            lat,
            lng,
        } => {
            let dash = RiderDashboard::open(backend, slot.require()?.clone(), poll).await?;
            let result = dash.request_ride(StationId(station), &eta, (lat, lng)).await;
            let view = dash.snapshot().await;
            dash.close().await;
            let ride = result?;
            println!(
                "Requested ride {} at {}, ETA {}: {}",
                ride.id,
                view.station_name(ride.station_id),
                ride.eta,
                ride.status
            );
        }
        Command::CancelRide { ride } => {
            let dash = RiderDashboard::open(backend, slot.require()?.clone(), poll).await?;
            let result = dash.cancel_ride(RideRequestId(ride)).await;
            dash.close().await;
            result?;
            println!("Cancelled ride {ride}");
        }
        Command::CreateDriver { seats, waypoints } => {
            let dash = DriverDashboard::open(backend, slot.require()?.clone(), poll).await?;
            let result = dash.register(seats, waypoints).await;
            dash.close().await;
            let driver = result?;
            println!(
                "Registered driver {} with {} waypoints",
                driver.id,
                driver.route_queue.len()
            );
        }
        action @ (Command::Start | Command::Stop) => {
            let starting = matches!(action, Command::Start);
            let dash = DriverDashboard::open(backend, slot.require()?.clone(), poll).await?;
            let result = if starting {
                dash.start().await
            } else {
                dash.stop().await
            };
            let view = dash.snapshot().await;
            dash.close().await;
            result?;
            print!("{view}");
        }
    }
    Ok(())
}

async fn watch<B: Backend>(
    backend: Arc<B>,
    session: Session,
    poll: PollConfig,
) -> Result<(), FeederError> {
    println!("Watching as {} ({}); Ctrl-C to stop", session.username, session.role);
    match session.role {
        Role::Rider => {
            let dash = RiderDashboard::open(backend, session, poll).await?;
            follow(poll, || dash.snapshot()).await;
            dash.close().await;
        }
        Role::Driver => {
            let dash = DriverDashboard::open(backend, session, poll).await?;
            follow(poll, || dash.snapshot()).await;
            dash.close().await;
        }
        Role::Admin => {
            let dash = AdminDashboard::open(backend, session, poll).await?;
            follow(poll, || dash.snapshot()).await;
            dash.close().await;
        }
    }
    Ok(())
}

/// Print the view whenever it changes, until Ctrl-C.
async fn follow<V, F, Fut>(poll: PollConfig, snapshot: F)
where
    V: PartialEq + fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = V>,
{
    let stop = tokio::signal::ctrl_c();
    tokio::pin!(stop);
    let mut interval = tokio::time::interval(poll.interval);
    let mut shown: Option<V> = None;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                let view = snapshot().await;
                if shown.as_ref() != Some(&view) {
                    println!("{view}");
                    shown = Some(view);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn writes_are_told_apart_from_reads() {
        for args in [
            &["feeder", "--mock", "start"][..],
            &["feeder", "stop", "--mock"],
            &["feeder", "--mock", "add-station", "Trinity", "12.97", "-77.6"],
            &["feeder", "--mock", "request-ride", "3", "09:30", "12.97", "77.59"],
            &["feeder", "--mock", "cancel-ride", "5"],
            &["feeder", "--mock", "create-driver", "1,1", "1,2"],
            &["feeder", "--mock", "register", "ana", "--email", "a@x", "--password", "pw"],
        ] {
            let cli = parse(args);
            assert!(cli.mock);
            assert!(cli.command.writes_backend(), "{args:?}");
        }

        for args in [
            &["feeder", "--mock", "watch"][..],
            &["feeder", "--mock", "login", "rider", "--password", "rider"],
            &["feeder", "--mock", "whoami"],
            &["feeder", "--mock", "logout"],
        ] {
            assert!(!parse(args).command.writes_backend(), "{args:?}");
        }
    }

    #[test]
    fn waypoints_parse_as_pairs() {
        let Command::CreateDriver { seats, waypoints } =
            parse(&["feeder", "create-driver", "--seats", "2", "12.97,77.59", "1.5,-2"]).command
        else {
            panic!("expected create-driver");
        };
        assert_eq!(seats, 2);
        assert_eq!(waypoints.len(), 2);
        assert_eq!(waypoints[1], LatLng::new(1.5, -2.0).unwrap());
        assert!(parse_point("12.97").is_err());
    }
}
