use super::{round_to, ScoringFunction};
use crate::models::ManufacturingOptimizationRequest;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PRODUCTION_LINES: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingPlan {
    pub batch_size: u32,
    pub line_allocation: String,
    pub estimated_unit_cost: f64,
    pub production_efficiency: f64,
    /// Expected utilization per raw material, 0 to 1.
    pub material_utilization: BTreeMap<String, f64>,
}

pub struct RandomManufacturingModel;

impl ScoringFunction<ManufacturingOptimizationRequest, ManufacturingPlan> for RandomManufacturingModel {
    fn evaluate(&self, input: &ManufacturingOptimizationRequest) -> ManufacturingPlan {
        let mut rng = rand::thread_rng();
        let (low, high) = input.batch_bounds();

        ManufacturingPlan {
            batch_size: rng.gen_range(low..=high),
            line_allocation: format!("Line-{}", rng.gen_range(1..=PRODUCTION_LINES)),
            estimated_unit_cost: round_to(rng.gen_range(1.5..5.0), 2),
            production_efficiency: round_to(rng.gen_range(0.75..0.95), 2),
            material_utilization: input
                .raw_materials
                .keys()
                .map(|material| (material.clone(), round_to(rng.gen_range(0.8..0.99), 2)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_respects_batch_range() {
        let request = ManufacturingOptimizationRequest {
            drug_candidate: "DC-001".to_string(),
            batch_size_range: vec![1000, 5000],
            raw_materials: BTreeMap::from([("API".to_string(), 50.0), ("Excipient".to_string(), 200.0)]),
            production_constraints: Default::default(),
        };
        for _ in 0..200 {
            let plan = RandomManufacturingModel.evaluate(&request);
            assert!((1000..=5000).contains(&plan.batch_size));
            let line: u32 = plan.line_allocation.trim_start_matches("Line-").parse().unwrap();
            assert!((1..=4).contains(&line));
            assert!((1.5..=5.0).contains(&plan.estimated_unit_cost));
            assert!((0.75..=0.95).contains(&plan.production_efficiency));
            assert_eq!(plan.material_utilization.len(), 2);
        }
    }

    #[test]
    fn test_reversed_range_is_tolerated() {
        let request = ManufacturingOptimizationRequest {
            drug_candidate: "DC-002".to_string(),
            batch_size_range: vec![900, 100],
            raw_materials: BTreeMap::new(),
            production_constraints: Default::default(),
        };
        let plan = RandomManufacturingModel.evaluate(&request);
        assert!((100..=900).contains(&plan.batch_size));
    }
}
