//! Cost statements.
//!
//! The costs endpoint answers with a different line-item shape per energy
//! class and no separate discriminator, so the reply is decoded in two steps:
//! first the envelope, then `costs` according to `energyClass`. An unknown or
//! missing class is returned as [`CostStatement::Unrecognized`] with the raw
//! items, never guessed.
//!
//! Every monetary field is optional. `None` means "not billed" and is kept as
//! `null` on re-encode, never turned into zero.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::time::Timestamp;
use crate::ApiClient;

use super::{decode, DateRange, FormatToApiFmt};

pub struct Costs<'a> {
    client: &'a dyn ApiClient,
}

/// Energy classes the costs endpoint knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyClass {
    Electricity,
    Production,
    Heat,
    Cold,
    Gas,
}

impl EnergyClass {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "electricity" => Some(EnergyClass::Electricity),
            "production" => Some(EnergyClass::Production),
            "heat" => Some(EnergyClass::Heat),
            "cold" => Some(EnergyClass::Cold),
            "gas" => Some(EnergyClass::Gas),
            _ => None,
        }
    }
}

/// Envelope plus line items for one energy class.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostsWrapper<T> {
    pub energy_class: String,
    pub installation: String,
    pub costs: Vec<T>,
}

/// A reply whose energy class could not be identified.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnrecognizedCosts {
    #[serde(default, deserialize_with = "lenient_text")]
    pub energy_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub installation: Option<String>,
    #[serde(default)]
    pub costs: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CostStatement {
    Electricity(CostsWrapper<CostElectricityProduction>),
    Production(CostsWrapper<CostElectricityProduction>),
    Heat(CostsWrapper<CostHeatCold>),
    Cold(CostsWrapper<CostHeatCold>),
    Gas(CostsWrapper<CostGas>),
    Unrecognized(UnrecognizedCosts),
}

impl CostStatement {
    /// Decodes a costs reply without knowing its variant up front.
    pub fn from_value(value: Value) -> Result<Self> {
        let body = value.to_string();
        Self::from_reply(value, &body)
    }

    // `body` is the reply as received, reported on decode failures.
    fn from_reply(value: Value, body: &str) -> Result<Self> {
        let envelope =
            UnrecognizedCosts::deserialize(&value).map_err(|e| Error::decode(&e, body))?;

        let class = envelope.energy_class.as_deref().and_then(EnergyClass::from_wire);
        let Some(class) = class else {
            debug!(energy_class = ?envelope.energy_class, "unrecognized energy class");
            return Ok(CostStatement::Unrecognized(envelope));
        };

        let energy_class = envelope.energy_class.unwrap_or_default();
        let installation = envelope.installation.unwrap_or_default();
        let costs = envelope.costs;

        Ok(match class {
            EnergyClass::Electricity => {
                CostStatement::Electricity(wrap(energy_class, installation, costs, body)?)
            }
            EnergyClass::Production => {
                CostStatement::Production(wrap(energy_class, installation, costs, body)?)
            }
            EnergyClass::Heat => CostStatement::Heat(wrap(energy_class, installation, costs, body)?),
            EnergyClass::Cold => CostStatement::Cold(wrap(energy_class, installation, costs, body)?),
            EnergyClass::Gas => CostStatement::Gas(wrap(energy_class, installation, costs, body)?),
        })
    }

    pub fn energy_class(&self) -> Option<EnergyClass> {
        match self {
            CostStatement::Electricity(_) => Some(EnergyClass::Electricity),
            CostStatement::Production(_) => Some(EnergyClass::Production),
            CostStatement::Heat(_) => Some(EnergyClass::Heat),
            CostStatement::Cold(_) => Some(EnergyClass::Cold),
            CostStatement::Gas(_) => Some(EnergyClass::Gas),
            CostStatement::Unrecognized(_) => None,
        }
    }

    pub fn installation(&self) -> Option<&str> {
        match self {
            CostStatement::Electricity(w) | CostStatement::Production(w) => {
                Some(w.installation.as_str())
            }
            CostStatement::Heat(w) | CostStatement::Cold(w) => Some(w.installation.as_str()),
            CostStatement::Gas(w) => Some(w.installation.as_str()),
            CostStatement::Unrecognized(u) => u.installation.as_deref(),
        }
    }
}

fn wrap<T: DeserializeOwned>(
    energy_class: String,
    installation: String,
    costs: Value,
    body: &str,
) -> Result<CostsWrapper<T>> {
    let costs = match costs {
        Value::Null => vec![],
        costs => Vec::<T>::deserialize(&costs).map_err(|e| Error::decode(&e, body))?,
    };
    Ok(CostsWrapper {
        energy_class,
        installation,
        costs,
    })
}

// Envelope text may arrive as null, a number or a string.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostElectricityProduction {
    #[serde(default)]
    pub month: Timestamp,
    pub retail_cost: Option<f64>,
    #[serde(rename = "retailCostVAT")]
    pub retail_cost_vat: Option<f64>,
    pub energy_tax: Option<f64>,
    #[serde(rename = "energyTaxVAT")]
    pub energy_tax_vat: Option<f64>,
    pub net_cost: Option<f64>,
    #[serde(rename = "netCostVAT")]
    pub net_cost_vat: Option<f64>,
    /// Only present for electricity.
    pub cost_grid_details: Option<CostGridDetails>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostHeatCold {
    #[serde(default)]
    pub month: Timestamp,
    pub retail_cost: Option<f64>,
    #[serde(rename = "retailCostVAT")]
    pub retail_cost_vat: Option<f64>,
    pub effect_cost: Option<f64>,
    #[serde(rename = "effectCostVAT")]
    pub effect_cost_vat: Option<f64>,
    pub energy_cost: Option<f64>,
    #[serde(rename = "energyCostVAT")]
    pub energy_cost_vat: Option<f64>,
    pub flow_cost: Option<f64>,
    #[serde(rename = "flowCostVAT")]
    pub flow_cost_vat: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostGas {
    #[serde(default)]
    pub month: Timestamp,
    pub retail_cost: Option<f64>,
    #[serde(rename = "retailCostVAT")]
    pub retail_cost_vat: Option<f64>,
    pub energy_tax: Option<f64>,
    #[serde(rename = "energyTaxVAT")]
    pub energy_tax_vat: Option<f64>,
    pub cost_bio_gas_details: Option<CostBioGasDetails>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostGridDetails {
    pub grid_subscription: Option<f64>,
    #[serde(rename = "gridSubscriptionVAT")]
    pub grid_subscription_vat: Option<f64>,
    pub grid_subscribed_effect_reactive_in: Option<f64>,
    #[serde(rename = "gridSubscribedEffectReactiveInVAT")]
    pub grid_subscribed_effect_reactive_in_vat: Option<f64>,
    pub grid_subscribed_effect_reactive_out: Option<f64>,
    #[serde(rename = "gridSubscribedEffectReactiveOutVAT")]
    pub grid_subscribed_effect_reactive_out_vat: Option<f64>,
    pub grid_subscribed_effect_winter: Option<f64>,
    #[serde(rename = "gridSubscribedEffectWinterVAT")]
    pub grid_subscribed_effect_winter_vat: Option<f64>,
    pub grid_subscribed_effect: Option<f64>,
    #[serde(rename = "gridSubscribedEffectVAT")]
    pub grid_subscribed_effect_vat: Option<f64>,
    pub grid_effect_compensation: Option<f64>,
    #[serde(rename = "gridEffectCompensationVAT")]
    pub grid_effect_compensation_vat: Option<f64>,
    pub grid_effect: Option<f64>,
    #[serde(rename = "gridEffectVAT")]
    pub grid_effect_vat: Option<f64>,
    pub grid_compensation_energy: Option<f64>,
    #[serde(rename = "gridCompensationEnergyVAT")]
    pub grid_compensation_energy_vat: Option<f64>,
    pub grid_exceeded_reactive_effect_out: Option<f64>,
    #[serde(rename = "gridExceededReactiveEffectOutVAT")]
    pub grid_exceeded_reactive_effect_out_vat: Option<f64>,
    pub grid_compensation_loss: Option<f64>,
    #[serde(rename = "gridCompensationLossVAT")]
    pub grid_compensation_loss_vat: Option<f64>,
    pub grid_other: Option<f64>,
    #[serde(rename = "gridOtherVAT")]
    pub grid_other_vat: Option<f64>,
    pub grid_exceeded_active_effect: Option<f64>,
    #[serde(rename = "gridExceededActiveEffectVAT")]
    pub grid_exceeded_active_effect_vat: Option<f64>,
    pub grid_fixed: Option<f64>,
    #[serde(rename = "gridFixedVAT")]
    pub grid_fixed_vat: Option<f64>,
    pub grid_exceeded_reactive_effect: Option<f64>,
    #[serde(rename = "gridExceededReactiveEffectVAT")]
    pub grid_exceeded_reactive_effect_vat: Option<f64>,
    pub grid_transfer: Option<f64>,
    #[serde(rename = "gridTransferVAT")]
    pub grid_transfer_vat: Option<f64>,
}

// Upstream spells the CO2 tax with a capital G and the others without.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct CostBioGasDetails {
    #[serde(rename = "bioGasCarbonDioxideTax")]
    pub bio_gas_carbon_dioxide_tax: Option<f64>,
    #[serde(rename = "bioGasCarbonDioxideTaxVAT")]
    pub bio_gas_carbon_dioxide_tax_vat: Option<f64>,
    #[serde(rename = "biogasEnergyTax")]
    pub biogas_energy_tax: Option<f64>,
    #[serde(rename = "biogasEnergyTaxVAT")]
    pub biogas_energy_tax_vat: Option<f64>,
    #[serde(rename = "biogasAccumulatedTax")]
    pub biogas_accumulated_tax: Option<f64>,
    #[serde(rename = "biogasAccumulatedTaxVAT")]
    pub biogas_accumulated_tax_vat: Option<f64>,
}

impl<'a> Costs<'a> {
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the cost statement of one installation. Whole months are
    /// considered for the range.
    ///
    /// Unlike the other endpoints, a 204 here is an error
    /// ([`Error::NoCostData`]) rather than an empty result.
    pub fn get(&self, installation_id: &str, range: DateRange) -> Result<CostStatement> {
        let path = format!("/costs/{}", installation_id);
        let qs = range.to_query_string(FormatToApiFmt::to_api_format);

        let Some(reply) = self.client.http_get(&path, &qs)? else {
            return Err(Error::NoCostData {
                installation_id: installation_id.to_string(),
            });
        };

        let value: Value = decode(&path, &qs, &reply)?;
        CostStatement::from_reply(value, &reply)
    }
}
