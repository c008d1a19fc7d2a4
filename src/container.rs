use serde::Deserialize;

/// A set of experiments sharing one bucket so that a user lands in at most one of its groups.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: i64,
    pub bucket_id: i64,
    pub groups: Vec<ContainerGroup>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ContainerGroup {
    pub id: i64,
    pub experiments: Vec<i64>,
}

impl Container {
    pub fn group(&self, group_id: i64) -> Option<&ContainerGroup> {
        self.groups.iter().find(|group| group.id == group_id)
    }
}

impl ContainerGroup {
    pub fn contains(&self, experiment_id: i64) -> bool {
        self.experiments.contains(&experiment_id)
    }
}
