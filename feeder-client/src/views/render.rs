//! Plain-text rendering of dashboard views for the terminal.

use std::fmt;

use crate::domain::{DriverState, Match, Station, station_name};

use super::{AdminView, DriverView, RiderView};

fn formed(m: &Match) -> String {
    m.formed_at
        .map(|t| format!(", formed {t}"))
        .unwrap_or_default()
}

fn write_matches(
    f: &mut fmt::Formatter<'_>,
    matches: &[Match],
    stations: &[Station],
    counterpart: impl Fn(&Match) -> String,
) -> fmt::Result {
    writeln!(f, "Matches ({}):", matches.len())?;
    for m in matches {
        writeln!(
            f,
            "  #{} {} at {}{}",
            m.id,
            counterpart(m),
            station_name(stations, m.station_id),
            formed(m)
        )?;
    }
    Ok(())
}

impl fmt::Display for DriverView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver {
            DriverState::Unregistered => writeln!(f, "No driver registered")?,
            DriverState::Removed { last } => {
                writeln!(f, "Route complete; driver {last} removed")?
            }
            DriverState::Idle(d) | DriverState::Simulating(d) => {
                writeln!(f, "Driver {}: {}", d.id, self.driver.label())?;
                writeln!(f, "  at {}, {} free seats", d.position, d.free_seats)?;
                writeln!(f, "  {} waypoints left", d.route_queue.len())?;
                if let Some(clock) = d.sim_timestamp {
                    writeln!(f, "  clock {clock}")?;
                }
                if let Some(station) = d.matched_station {
                    writeln!(
                        f,
                        "  heading for {} (waited {} ticks)",
                        self.station_name(station),
                        d.wait_counter
                    )?;
                }
            }
        }
        write_matches(f, &self.matches, &self.stations, |m| {
            format!("rider {}", m.rider_id)
        })
    }
}

impl fmt::Display for RiderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ride requests ({}):", self.rides.len())?;
        for ride in &self.rides {
            writeln!(
                f,
                "  #{} {} ETA {} -> {} {}",
                ride.id,
                self.station_name(ride.station_id),
                ride.eta,
                ride.destination,
                self.status_of(ride)
            )?;
        }
        write_matches(f, &self.matches, &self.stations, |m| {
            format!("driver {}", m.driver_id)
        })
    }
}

impl fmt::Display for AdminView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stations ({}):", self.stations.len())?;
        for s in &self.stations {
            writeln!(f, "  #{} {} {}", s.id, s.name, s.location)?;
        }
        writeln!(f, "Active drivers ({}):", self.drivers.len())?;
        for d in &self.drivers {
            writeln!(
                f,
                "  #{} user {} at {}, {} seats, {} waypoints left",
                d.id,
                d.user_id,
                d.position,
                d.free_seats,
                d.route_queue.len()
            )?;
        }
        Ok(())
    }
}
