//! Placeholder quoting
//!
//! Routing and pricing are out of scope. `FixedSolutionProvider` answers
//! every query with the same two offers: a ground robot at a flat price
//! and a free drone run.

use crate::ports::SolutionProvider;
use crate::types::{MachineType, Query, Solution, Station};
use crate::Result;
use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;

/// Returns fixed placeholder solutions
#[derive(Debug, Clone)]
pub struct FixedSolutionProvider {
    robot_price: Decimal,
}

impl FixedSolutionProvider {
    pub fn new() -> Self {
        Self {
            robot_price: Decimal::ONE,
        }
    }

    /// Override the robot offer's price
    pub fn with_robot_price(price: Decimal) -> Self {
        Self { robot_price: price }
    }

    fn offer(query: &Query, machine_type: MachineType, price: Decimal) -> Solution {
        let start = query.time;
        Solution {
            starting_point: query.starting_point.clone(),
            destination: query.destination.clone(),
            quoted_at: query.time,
            start_time: start,
            pickup_time: start + Duration::minutes(10),
            dropoff_time: start + Duration::minutes(40),
            end_time: start + Duration::minutes(55),
            station: Station::NotInStation,
            machine_type,
            price,
            weight: query.weight,
        }
    }
}

impl Default for FixedSolutionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SolutionProvider for FixedSolutionProvider {
    async fn produce_solutions(&self, query: &Query) -> Result<Vec<Solution>> {
        Ok(vec![
            Self::offer(query, MachineType::RobotOnly, self.robot_price),
            Self::offer(query, MachineType::DroneOnly, Decimal::ZERO),
        ])
    }
}
