pub mod step_graph;
