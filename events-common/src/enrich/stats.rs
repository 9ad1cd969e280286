use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use super::{as_number, Enricher};
use crate::dates;
use crate::table::EventTable;

/// Upper bounds (inclusive) of the cumulative-activity share for each onion role.
const ONION_ROLES: &[(f64, &str)] = &[(80.0, "core"), (95.0, "regular"), (100.0, "casual")];

/// Adds `max_<col>` and `min_<col>` computed per `groupby` value for each listed column.
#[derive(Debug, Clone)]
pub struct MaxMin {
    columns: Vec<String>,
    groupby: String,
}

impl MaxMin {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, groupby: impl Into<String>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            groupby: groupby.into(),
        }
    }
}

impl Enricher for MaxMin {
    fn required_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.groupby.as_str()))
            .collect()
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        let groupby = [self.groupby.as_str()];
        let keys: Vec<Option<String>> = match table.column(&self.groupby) {
            Some(cells) => cells
                .iter()
                .enumerate()
                .map(|(row, cell)| (!cell.is_null()).then(|| table.key(row, &groupby)))
                .collect(),
            None => return table,
        };

        for column in &self.columns {
            let Some(values) = table.column(column) else {
                continue;
            };

            let (max_values, min_values) = {
                let mut extremes: HashMap<&str, (&Value, &Value)> = HashMap::new();
                for (key, value) in keys.iter().zip(values) {
                    let Some(key) = key else { continue };
                    if !is_comparable(value) {
                        continue;
                    }
                    extremes
                        .entry(key.as_str())
                        .and_modify(|(max, min)| {
                            if compare_cells(value, max) == Ordering::Greater {
                                *max = value;
                            }
                            if compare_cells(value, min) == Ordering::Less {
                                *min = value;
                            }
                        })
                        .or_insert((value, value));
                }

                let lookup = |pick: fn(&(&Value, &Value)) -> Value| -> Vec<Value> {
                    keys.iter()
                        .map(|key| {
                            key.as_deref()
                                .and_then(|key| extremes.get(key))
                                .map_or(Value::Null, pick)
                        })
                        .collect()
                };
                (
                    lookup(|(max, _)| Value::clone(max)),
                    lookup(|(_, min)| Value::clone(min)),
                )
            };

            table.set_column(format!("max_{column}"), max_values);
            table.set_column(format!("min_{column}"), min_values);
        }

        table
    }
}

fn is_comparable(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// Numbers order numerically and sort before strings. Two date strings order by instant,
/// whatever their offsets; other strings order lexically.
fn compare_cells(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (dates::parse_cell(a), dates::parse_cell(b)) {
        return x.cmp(&y);
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Adds `timedifference`, the seconds elapsed from `column1` to `column2`.
#[derive(Debug, Clone)]
pub struct TimeDifference {
    column1: String,
    column2: String,
}

impl TimeDifference {
    pub fn new(column1: impl Into<String>, column2: impl Into<String>) -> Self {
        Self {
            column1: column1.into(),
            column2: column2.into(),
        }
    }
}

impl Enricher for TimeDifference {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column1.as_str(), self.column2.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        let (Some(start), Some(end)) = (table.column(&self.column1), table.column(&self.column2))
        else {
            return table;
        };

        let differences = start
            .iter()
            .zip(end)
            .map(|(start, end)| match (dates::parse_cell(start), dates::parse_cell(end)) {
                (Some(start), Some(end)) => {
                    let elapsed = end.signed_duration_since(start);
                    Value::from(elapsed.num_milliseconds() as f64 / 1000.0)
                }
                _ => Value::Null,
            })
            .collect();

        table.set_column("timedifference", differences);
        table
    }
}

/// Onion model: ranks members by activity and tags them `core`, `regular` or `casual`
/// according to the cumulative share of activity up to their position.
///
/// Rows are reordered by `events_column`, highest first, and gain `cum_net_sum`,
/// `percent_cum_net_sum` and `onion_role`.
#[derive(Debug, Clone)]
pub struct Onion {
    member_column: String,
    events_column: String,
}

impl Onion {
    pub fn new(member_column: impl Into<String>, events_column: impl Into<String>) -> Self {
        Self {
            member_column: member_column.into(),
            events_column: events_column.into(),
        }
    }
}

impl Enricher for Onion {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.member_column.as_str(), self.events_column.as_str()]
    }

    fn apply(&self, table: EventTable) -> EventTable {
        let Some(events) = table.column(&self.events_column) else {
            return table;
        };

        let counts: Vec<Option<f64>> = events.iter().map(as_number).collect();
        let mut order: Vec<usize> = (0..counts.len()).collect();
        order.sort_by(|&a, &b| match (counts[a], counts[b]) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let total: f64 = counts.iter().flatten().sum();
        let mut running = 0.0;
        let mut cumulative = Vec::with_capacity(order.len());
        let mut percent = Vec::with_capacity(order.len());
        let mut roles = Vec::with_capacity(order.len());
        for &row in &order {
            running += counts[row].unwrap_or(0.0);
            cumulative.push(Value::from(running));
            if total > 0.0 {
                let share = running / total * 100.0;
                percent.push(Value::from(share));
                roles.push(onion_role(share));
            } else {
                percent.push(Value::Null);
                roles.push(Value::Null);
            }
        }

        let mut ranked = table.take_rows(&order);
        ranked.set_column("cum_net_sum", cumulative);
        ranked.set_column("percent_cum_net_sum", percent);
        ranked.set_column("onion_role", roles);
        ranked
    }
}

fn onion_role(share: f64) -> Value {
    let role = ONION_ROLES
        .iter()
        .find(|(bound, _)| share <= *bound)
        .map_or("casual", |(_, role)| *role);
    Value::from(role)
}
