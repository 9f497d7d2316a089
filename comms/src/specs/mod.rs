pub mod federated;
pub mod machine_learning;
