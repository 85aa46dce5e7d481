use std::fmt;

use crate::{Result, TutorialError};

/// A node of a declared computation graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// The graph input, one sample per row.
    Variable { name: String },
    /// An affine map `x · w + b` with `num_hidden` outputs.
    FullyConnected { name: String, num_hidden: usize },
    /// A squared error output comparing the previous node against a label.
    LinearRegressionOutput { name: String },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Variable { name }
            | Node::FullyConnected { name, .. }
            | Node::LinearRegressionOutput { name } => name,
        }
    }
}

/// The declaration of a model: named nodes connected input to output.
///
/// Nothing is computed here. A `Graph` only knows its nodes and how shapes flow through them,
/// `Module::bind` turns it into something that can be trained.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Starts a graph with an input variable.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::Variable { name: input.into() }],
        }
    }

    /// The graph every tutorial trains: `data -> fc1(1) -> lin_reg`.
    pub fn linear_regression() -> Self {
        Self::new("data")
            .fully_connected("fc1", 1)
            .linear_regression_output("lin_reg")
    }

    /// Appends an affine node.
    pub fn fully_connected(mut self, name: impl Into<String>, num_hidden: usize) -> Self {
        self.nodes.push(Node::FullyConnected {
            name: name.into(),
            num_hidden,
        });
        self
    }

    /// Terminates the graph with a squared error output.
    pub fn linear_regression_output(mut self, name: impl Into<String>) -> Self {
        self.nodes
            .push(Node::LinearRegressionOutput { name: name.into() });
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn input_name(&self) -> &str {
        self.nodes[0].name()
    }

    /// The name of the label argument, derived from the output node.
    pub fn label_name(&self) -> Option<String> {
        match self.nodes.last()? {
            Node::LinearRegressionOutput { name } => Some(format!("{name}_label")),
            _ => None,
        }
    }

    /// The `(name, num_hidden)` of every affine node, input to output.
    pub fn layers(&self) -> impl Iterator<Item = (&str, usize)> {
        self.nodes.iter().filter_map(|node| match node {
            Node::FullyConnected { name, num_hidden } => Some((name.as_str(), *num_hidden)),
            _ => None,
        })
    }

    /// Every argument of the graph in declaration order: the input, the weight and bias of
    /// every affine node, then the label.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![self.input_name().to_string()];

        for (name, _) in self.layers() {
            args.push(format!("{name}_weight"));
            args.push(format!("{name}_bias"));
        }

        args.extend(self.label_name());
        args
    }

    /// Returns the width of the graph output.
    pub fn output_size(&self) -> Result<usize> {
        self.validate()?;

        self.layers()
            .last()
            .map(|(_, num_hidden)| num_hidden)
            .ok_or_else(|| TutorialError::InvalidConfig("graph has no fully connected node".into()))
    }

    /// Infers the shape of every argument given the shape of the input.
    ///
    /// # Arguments
    /// * `data_shape` - The `(batch_size, features)` of the input.
    ///
    /// # Returns
    /// The `(argument, shape)` pairs in the order of `Graph::arguments`.
    pub fn infer_shapes(&self, data_shape: (usize, usize)) -> Result<Vec<(String, Vec<usize>)>> {
        self.validate()?;

        let (batch_size, mut features) = data_shape;
        let mut shapes = vec![(self.input_name().to_string(), vec![batch_size, features])];

        for (name, num_hidden) in self.layers() {
            shapes.push((format!("{name}_weight"), vec![features, num_hidden]));
            shapes.push((format!("{name}_bias"), vec![num_hidden]));
            features = num_hidden;
        }

        if let Some(label) = self.label_name() {
            shapes.push((label, vec![batch_size, features]));
        }

        Ok(shapes)
    }

    /// Checks the graph is an input, one or more affine nodes with outputs, then a single
    /// regression output.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TutorialError::InvalidConfig(msg));

        let Some((last, middle)) = self.nodes[1..].split_last() else {
            return invalid(format!("graph '{}' has no nodes after its input", self.input_name()));
        };

        if !matches!(last, Node::LinearRegressionOutput { .. }) {
            return invalid(format!(
                "graph must end with a regression output, it ends with '{}'",
                last.name()
            ));
        }

        if middle.is_empty() {
            return invalid("graph has no fully connected node".into());
        }

        for node in middle {
            match node {
                Node::FullyConnected { num_hidden: 0, name } => {
                    return invalid(format!("node '{name}' has no hidden units"));
                }
                Node::FullyConnected { .. } => {}
                other => {
                    return invalid(format!(
                        "node '{}' can't be in the middle of the graph",
                        other.name()
                    ));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for node in &self.nodes {
            if !first {
                f.write_str(" -> ")?;
            }
            first = false;

            match node {
                Node::Variable { name } | Node::LinearRegressionOutput { name } => {
                    write!(f, "{name}")?
                }
                Node::FullyConnected { name, num_hidden } => write!(f, "{name}({num_hidden})")?,
            }
        }

        Ok(())
    }
}
