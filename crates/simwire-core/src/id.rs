use slotmap::new_key_type;

new_key_type! {
    /// Identifies a component node in a dependency graph.
    pub struct NodeId;
}
