//! Code for reading load zones, pricing nodes and their time series.
use super::*;
use crate::units::{MoneyPerEnergy, Power};
use crate::zone::{LoadZone, LoadZoneMap, NodeID, PricingNode, PricingNodeMap, ZoneID};
use indexmap::IndexSet;
use log::warn;
use serde::Deserialize;
use std::rc::Rc;

const PRICING_NODES_FILE_NAME: &str = "pricing_nodes.csv";
const NODAL_PRICES_FILE_NAME: &str = "nodal_prices.csv";
const LOAD_ZONES_FILE_NAME: &str = "load_zones.csv";
const LOADS_FILE_NAME: &str = "loads.csv";
const HEDGE_PREMIUM_FILE_NAME: &str = "hedge_premium_cost.csv";

/// Hedge premium used for any (zone, timepoint) not listed in the hedge premium file
const DEFAULT_HEDGE_PREMIUM: MoneyPerEnergy = MoneyPerEnergy(1.0);

/// Hedge premiums below this value are raised to it
const MIN_HEDGE_PREMIUM: MoneyPerEnergy = MoneyPerEnergy(0.01);

#[derive(PartialEq, Debug, Deserialize)]
struct PricingNodeRaw {
    pricing_node: String,
}

#[derive(PartialEq, Debug, Deserialize)]
struct NodalPriceRaw {
    pricing_node: String,
    timepoint: String,
    nodal_price: MoneyPerEnergy,
}

#[derive(PartialEq, Debug, Deserialize)]
struct LoadZoneRaw {
    load_zone: String,
    load_pricing_node: String,
}

#[derive(PartialEq, Debug, Deserialize)]
struct LoadRaw {
    load_zone: String,
    timepoint: String,
    zone_demand_mw: Power,
}

#[derive(PartialEq, Debug, Deserialize)]
struct HedgePremiumRaw {
    load_zone: String,
    timepoint: String,
    hedge_premium_cost: MoneyPerEnergy,
}

/// Read pricing nodes and their wholesale price series.
///
/// A node may have no prices, as long as nothing refers to it. Partial price series are an error.
pub fn read_pricing_nodes(model_dir: &Path, timescale: &Timescale) -> Result<PricingNodeMap> {
    let file_path = model_dir.join(PRICING_NODES_FILE_NAME);
    let node_ids = read_node_ids_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(NODAL_PRICES_FILE_NAME);
    read_nodal_prices_from_iter(read_csv(&file_path)?, node_ids, timescale)
        .with_context(|| input_err_msg(&file_path))
}

fn read_node_ids_from_iter<I>(iter: I) -> Result<IndexSet<NodeID>>
where
    I: Iterator<Item = PricingNodeRaw>,
{
    let mut ids = IndexSet::new();
    for raw in iter {
        let id = NodeID::new(&raw.pricing_node);
        ensure!(ids.insert(id.clone()), "Duplicate pricing node {id}");
    }

    Ok(ids)
}

fn read_nodal_prices_from_iter<I>(
    iter: I,
    node_ids: IndexSet<NodeID>,
    timescale: &Timescale,
) -> Result<PricingNodeMap>
where
    I: Iterator<Item = NodalPriceRaw>,
{
    let rows = iter.map(|raw| -> Result<_> {
        ensure!(
            raw.nodal_price.is_finite(),
            "Price for node {} in timepoint {} must be a finite number",
            raw.pricing_node,
            raw.timepoint
        );
        Ok((raw.pricing_node, raw.timepoint, raw.nodal_price))
    });
    let mut prices = read_timepoint_series(
        rows.process_results(|iter| iter.collect_vec())?.into_iter(),
        &node_ids,
        timescale,
    )?;

    node_ids
        .into_iter()
        .map(|id| -> Result<_> {
            let prices = prices.remove(&id).unwrap_or_default();
            if !prices.is_empty() {
                check_timepoint_coverage(&prices, timescale, &format!("price for node {id}"))?;
            }

            let node = PricingNode {
                id: id.clone(),
                prices,
            };
            Ok((id, Rc::new(node)))
        })
        .try_collect()
}

/// Check that a referenced pricing node exists and has a price in every timepoint
pub(super) fn check_node_has_prices(nodes: &PricingNodeMap, id: &str) -> Result<NodeID> {
    let (id, node) = nodes
        .get_key_value(id)
        .with_context(|| format!("Unknown pricing node {id}"))?;
    ensure!(
        !node.prices.is_empty(),
        "Pricing node {id} has no prices in {NODAL_PRICES_FILE_NAME}"
    );

    Ok(id.clone())
}

/// Read load zones, their demand and their hedge premiums.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `nodes` - All pricing nodes
/// * `timescale` - The model's timepoints
pub fn read_load_zones(
    model_dir: &Path,
    nodes: &PricingNodeMap,
    timescale: &Timescale,
) -> Result<LoadZoneMap> {
    let file_path = model_dir.join(LOAD_ZONES_FILE_NAME);
    let zones = read_zones_from_iter(read_csv(&file_path)?, nodes)
        .with_context(|| input_err_msg(&file_path))?;
    let zone_ids: IndexSet<ZoneID> = zones.iter().map(|(id, _)| id.clone()).collect();

    let file_path = model_dir.join(LOADS_FILE_NAME);
    let mut loads = read_loads_from_iter(read_csv(&file_path)?, &zone_ids, timescale)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(HEDGE_PREMIUM_FILE_NAME);
    let mut hedge_premiums =
        read_hedge_premiums_from_iter(read_csv_optional(&file_path)?, &zone_ids, timescale)
            .with_context(|| input_err_msg(&file_path))?;

    Ok(zones
        .into_iter()
        .map(|(id, load_pricing_node)| {
            let zone = LoadZone {
                id: id.clone(),
                load_pricing_node,
                demand: loads.remove(&id).unwrap_or_default(),
                hedge_premium: hedge_premiums.remove(&id).unwrap_or_default(),
            };
            (id, Rc::new(zone))
        })
        .collect())
}

fn read_zones_from_iter<I>(iter: I, nodes: &PricingNodeMap) -> Result<Vec<(ZoneID, NodeID)>>
where
    I: Iterator<Item = LoadZoneRaw>,
{
    let mut ids = IndexSet::new();
    let mut zones = Vec::new();
    for raw in iter {
        let id = ZoneID::new(&raw.load_zone);
        ensure!(ids.insert(id.clone()), "Duplicate load zone {id}");
        let node = check_node_has_prices(nodes, &raw.load_pricing_node)
            .with_context(|| format!("Invalid load_pricing_node for zone {id}"))?;
        zones.push((id, node));
    }

    Ok(zones)
}

fn read_loads_from_iter<I>(
    iter: I,
    zone_ids: &IndexSet<ZoneID>,
    timescale: &Timescale,
) -> Result<HashMap<ZoneID, HashMap<TimepointID, Power>>>
where
    I: Iterator<Item = LoadRaw>,
{
    let rows = iter
        .map(|raw| -> Result<_> {
            ensure!(
                raw.zone_demand_mw.is_finite() && raw.zone_demand_mw >= Power(0.0),
                "Demand for zone {} in timepoint {} must be a non-negative number",
                raw.load_zone,
                raw.timepoint
            );
            Ok((raw.load_zone, raw.timepoint, raw.zone_demand_mw))
        })
        .process_results(|iter| iter.collect_vec())?;
    let loads = read_timepoint_series(rows.into_iter(), zone_ids, timescale)?;

    for id in zone_ids {
        let demand = loads
            .get(id)
            .with_context(|| format!("No demand given for zone {id}"))?;
        check_timepoint_coverage(demand, timescale, &format!("demand for zone {id}"))?;
    }

    Ok(loads)
}

fn read_hedge_premiums_from_iter<I>(
    iter: I,
    zone_ids: &IndexSet<ZoneID>,
    timescale: &Timescale,
) -> Result<HashMap<ZoneID, HashMap<TimepointID, MoneyPerEnergy>>>
where
    I: Iterator<Item = HedgePremiumRaw>,
{
    let rows = iter
        .map(|raw| -> Result<_> {
            ensure!(
                raw.hedge_premium_cost.is_finite(),
                "Hedge premium for zone {} in timepoint {} must be a finite number",
                raw.load_zone,
                raw.timepoint
            );
            Ok((raw.load_zone, raw.timepoint, raw.hedge_premium_cost))
        })
        .process_results(|iter| iter.collect_vec())?;
    let mut premiums = read_timepoint_series(rows.into_iter(), zone_ids, timescale)?;

    let mut num_clamped = 0;
    for id in zone_ids {
        let series = premiums.entry(id.clone()).or_default();
        for timepoint in timescale.timepoints.keys() {
            let premium = series
                .entry(timepoint.clone())
                .or_insert(DEFAULT_HEDGE_PREMIUM);
            if *premium < MIN_HEDGE_PREMIUM {
                *premium = MIN_HEDGE_PREMIUM;
                num_clamped += 1;
            }
        }
    }

    if num_clamped > 0 {
        warn!(
            "{num_clamped} hedge premium value(s) were below {} $/MWh and have been raised to it",
            MIN_HEDGE_PREMIUM.value()
        );
    }

    Ok(premiums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, nodes, timescale};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn zone_ids() -> IndexSet<ZoneID> {
        ["north".into()].into_iter().collect()
    }

    #[rstest]
    fn test_read_nodal_prices_partial(timescale: Timescale) {
        let node_ids: IndexSet<NodeID> = ["node1".into(), "node2".into()].into_iter().collect();
        let first = timescale.timepoints.keys().next().unwrap().to_string();
        let rows = timescale
            .timepoints
            .keys()
            .map(|tp| NodalPriceRaw {
                pricing_node: "node1".into(),
                timepoint: tp.to_string(),
                nodal_price: MoneyPerEnergy(20.0),
            })
            .chain(std::iter::once(NodalPriceRaw {
                pricing_node: "node2".into(),
                timepoint: first,
                nodal_price: MoneyPerEnergy(20.0),
            }))
            .collect_vec();

        assert!(read_nodal_prices_from_iter(rows.into_iter(), node_ids, &timescale).is_err());
    }

    #[rstest]
    fn test_read_nodal_prices_unused_node(timescale: Timescale) {
        let node_ids: IndexSet<NodeID> = ["node1".into(), "spare".into()].into_iter().collect();
        let rows = timescale
            .timepoints
            .keys()
            .map(|tp| NodalPriceRaw {
                pricing_node: "node1".into(),
                timepoint: tp.to_string(),
                nodal_price: MoneyPerEnergy(-5.0),
            })
            .collect_vec();

        let nodes = read_nodal_prices_from_iter(rows.into_iter(), node_ids, &timescale).unwrap();
        assert!(nodes["spare"].prices.is_empty());
        assert_error!(
            check_node_has_prices(&nodes, "spare"),
            "Pricing node spare has no prices in nodal_prices.csv"
        );
        assert!(check_node_has_prices(&nodes, "node1").is_ok());
    }

    #[rstest]
    fn test_read_zones_unknown_node(nodes: PricingNodeMap) {
        let raw = LoadZoneRaw {
            load_zone: "north".into(),
            load_pricing_node: "nowhere".into(),
        };
        assert_error!(
            read_zones_from_iter(std::iter::once(raw), &nodes),
            "Invalid load_pricing_node for zone north"
        );
    }

    #[rstest]
    fn test_read_loads_missing_timepoint(timescale: Timescale) {
        let first = timescale.timepoints.keys().next().unwrap().to_string();
        let raw = LoadRaw {
            load_zone: "north".into(),
            timepoint: first,
            zone_demand_mw: Power(10.0),
        };
        assert!(read_loads_from_iter(std::iter::once(raw), &zone_ids(), &timescale).is_err());
    }

    #[rstest]
    fn test_read_hedge_premiums_default_and_clamp(timescale: Timescale) {
        let mut tps = timescale.timepoints.keys();
        let first = tps.next().unwrap().clone();
        let second = tps.next().unwrap().clone();
        let raw = HedgePremiumRaw {
            load_zone: "north".into(),
            timepoint: first.to_string(),
            hedge_premium_cost: MoneyPerEnergy(0.0),
        };

        let premiums =
            read_hedge_premiums_from_iter(std::iter::once(raw), &zone_ids(), &timescale).unwrap();
        let series = &premiums[&ZoneID::new("north")];
        assert_eq!(series.len(), timescale.timepoints.len());
        assert_approx_eq!(f64, series[&first].value(), 0.01);
        assert_approx_eq!(f64, series[&second].value(), 1.0);
    }
}
