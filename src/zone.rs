//! Load zones and wholesale pricing nodes.
use crate::id::define_id_type;
use crate::timescale::TimepointID;
use crate::units::{MoneyPerEnergy, Power};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

define_id_type! {ZoneID, "load zone"}
define_id_type! {NodeID, "pricing node"}

/// A map of [`LoadZone`]s, keyed by zone ID
pub type LoadZoneMap = IndexMap<ZoneID, Rc<LoadZone>>;

/// A map of [`PricingNode`]s, keyed by node ID
pub type PricingNodeMap = IndexMap<NodeID, Rc<PricingNode>>;

/// A demand-balancing area
#[derive(PartialEq, Debug, Clone)]
pub struct LoadZone {
    /// Unique identifier for the zone
    pub id: ZoneID,
    /// The node whose price is used to settle the zone's load (the DLAP)
    pub load_pricing_node: NodeID,
    /// Demand in each timepoint
    pub demand: HashMap<TimepointID, Power>,
    /// Premium paid on top of wholesale prices for grid power in each timepoint
    pub hedge_premium: HashMap<TimepointID, MoneyPerEnergy>,
}

impl LoadZone {
    /// Demand in the given timepoint.
    ///
    /// # Panics
    ///
    /// If the demand series does not cover the timepoint. Coverage is checked when the series is
    /// read.
    pub fn demand(&self, timepoint: &TimepointID) -> Power {
        self.demand[timepoint]
    }

    /// The hedge premium in the given timepoint
    pub fn hedge_premium(&self, timepoint: &TimepointID) -> MoneyPerEnergy {
        self.hedge_premium[timepoint]
    }
}

/// A wholesale settlement point
#[derive(PartialEq, Debug, Clone)]
pub struct PricingNode {
    /// Unique identifier for the node
    pub id: NodeID,
    /// Wholesale price in each timepoint
    pub prices: HashMap<TimepointID, MoneyPerEnergy>,
}

impl PricingNode {
    /// Wholesale price in the given timepoint.
    ///
    /// # Panics
    ///
    /// If the price series does not cover the timepoint.
    pub fn price(&self, timepoint: &TimepointID) -> MoneyPerEnergy {
        self.prices[timepoint]
    }
}
