mod congestion;
mod cost_model;
mod dci_scenario;
mod flow_affinity;
mod packet;
mod simulator;
