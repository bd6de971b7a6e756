use robolog_common::join_path;

use crate::frame::Frame;
use crate::loggable::Loggable;

/// A named container of loggables.
///
/// Children run in registration order. Adding a child attaches it, which
/// recomputes the paths of its whole subtree.
#[derive(Debug)]
pub struct Group {
    name: String,
    path: String,
    children: Vec<Box<dyn Loggable>>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            children: Vec::new(),
        }
    }

    /// Add a child and attach it under this group.
    pub fn add(&mut self, child: impl Loggable + 'static) -> &mut Self {
        self.add_boxed(Box::new(child))
    }

    pub fn add_boxed(&mut self, mut child: Box<dyn Loggable>) -> &mut Self {
        child.attach(Some(&self.path));
        self.children.push(child);
        self
    }

    pub fn children(&self) -> &[Box<dyn Loggable>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Paths of every value published below this group.
    pub fn entry_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }
}

impl Loggable for Group {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn attach(&mut self, parent: Option<&str>) {
        self.path = join_path(parent, &self.name);
        for child in &mut self.children {
            child.attach(Some(&self.path));
        }
    }

    fn init(&mut self, frame: &mut Frame<'_>) {
        for child in &mut self.children {
            child.init(frame);
        }
    }

    fn run(&mut self, frame: &mut Frame<'_>) {
        for child in &mut self.children {
            child.run(frame);
        }
    }

    fn unpublish(&mut self, frame: &mut Frame<'_>) {
        for child in &mut self.children {
            child.unpublish(frame);
        }
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        for child in &self.children {
            child.collect_paths(out);
        }
    }

    fn entry_count(&self) -> usize {
        self.children.iter().map(|child| child.entry_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::frame::{RunMode, Sinks};

    #[test]
    fn test_paths_follow_attachment() {
        let mut motor = Group::new("leftMotor");
        motor.add(Entry::new("temperature", || 41.0_f64));
        motor.add(Entry::new("current", || 3.0_f64));

        let mut drivetrain = Group::new("drivetrain");
        drivetrain.add(motor);

        assert_eq!(
            drivetrain.entry_paths(),
            vec![
                "drivetrain/leftMotor/temperature",
                "drivetrain/leftMotor/current"
            ]
        );
        assert_eq!(drivetrain.entry_count(), 2);
        assert_eq!(drivetrain.len(), 1);
    }

    #[test]
    fn test_reattach_moves_subtree() {
        let mut arm = Group::new("arm");
        arm.add(Entry::new("angle", || 0.0_f64));

        let mut robot = Group::new("robot");
        robot.add(arm);
        robot.attach(Some("team"));

        assert_eq!(robot.entry_paths(), vec!["team/robot/arm/angle"]);
    }

    #[test]
    fn test_run_and_unpublish_fan_out() {
        let (mut sinks, _log) = Sinks::in_memory();
        let mut group = Group::new("intake");
        group.add(Entry::new("on", || true));
        group.add(Entry::new("rpm", || 3000_i32));

        group.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        assert_eq!(sinks.live().paths().count(), 2);

        group.unpublish(&mut Frame::new(&mut sinks, RunMode::Teleop));
        assert_eq!(sinks.live().paths().count(), 0);
    }
}
