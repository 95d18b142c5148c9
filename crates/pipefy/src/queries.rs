//! GraphQL operation documents sent to Pipefy.

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Operation name, used for logging and by test transports.
    pub name: &'static str,
    pub document: &'static str,
}

pub const GET_PIPE_PHASES: Operation = Operation {
    name: "GetPipePhases",
    document: r#"
query GetPipePhases($pipeId: ID!) {
  pipe(id: $pipeId) {
    phases {
      id
      name
    }
  }
}
"#,
};

pub const GET_PHASE_FIELDS: Operation = Operation {
    name: "GetPhaseFields",
    document: r#"
query GetPhaseFields($phaseId: ID!) {
  phase(id: $phaseId) {
    fields {
      id
      label
      type
    }
  }
}
"#,
};

/// Start-form fields plus the fields of every phase.
pub const GET_PIPE_FIELDS: Operation = Operation {
    name: "GetPipeFields",
    document: r#"
query GetPipeFields($pipeId: ID!) {
  pipe(id: $pipeId) {
    start_form_fields {
      id
      label
      type
    }
    phases {
      fields {
        id
        label
        type
      }
    }
  }
}
"#,
};

pub const GET_PIPE_MEMBERS: Operation = Operation {
    name: "GetPipeMembers",
    document: r#"
query GetPipeMembers($pipeId: ID!) {
  pipe(id: $pipeId) {
    members {
      user {
        id
        name
        email
      }
    }
  }
}
"#,
};

pub const UPDATE_CARD_FIELD: Operation = Operation {
    name: "UpdateCardField",
    document: r#"
mutation UpdateCardField($input: UpdateCardFieldInput!) {
  updateCardField(input: $input) {
    success
  }
}
"#,
};

/// Selects only the moved `card`; a `null` card means the move was refused.
/// The payload's `errors` list is not requested, so the nested-errors check
/// in [`crate::bulk`] fires only when a response carries one anyway.
pub const MOVE_CARD_TO_PHASE: Operation = Operation {
    name: "MoveCardToPhase",
    document: r#"
mutation MoveCardToPhase($input: MoveCardToPhaseInput!) {
  moveCardToPhase(input: $input) {
    card {
      id
      title
    }
  }
}
"#,
};
