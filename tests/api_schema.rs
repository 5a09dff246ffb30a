use fusion_federation::subgraph::{FusionDirective, SourceField, SourceSchema, SourceType};
use fusion_federation::Supergraph;

use crate::fixtures;

#[test]
fn hides_lookups_and_requirement_arguments() {
    let supergraph = fixtures::shop();
    insta::assert_snapshot!(supergraph.to_api_schema(), @r###"
    schema {
      query: Query
      mutation: Mutation
    }

    type Product {
      id: ID!
      weight: Int
      inStock: Boolean!
      shippingEstimate: Int
      name: String!
      price: Int
      reviews: [Review!]
    }

    type Query {
      topProducts: [Product]!
    }

    type Mutation {
      addProduct(name: String!): Product
      addReview(body: String!): Review
    }

    type Review {
      id: ID!
      body: String!
      author: String
    }
    "###);
}

#[test]
fn inaccessible_types_are_dropped_from_references() {
    let media = SourceSchema::new("media")
        .with_type(SourceType::object("Query").field(SourceField::new("search", "[Media]")))
        .with_type(SourceType::union("Media").member("Book").member("Draft"))
        .with_type(SourceType::interface("Node").field(SourceField::new("id", "ID!")))
        .with_type(
            SourceType::object("Book")
                .implements("Node")
                .field(SourceField::new("id", "ID!"))
                .field(SourceField::new("title", "String")),
        )
        .with_type(
            SourceType::object("Draft")
                .directive(FusionDirective::Inaccessible)
                .implements("Node")
                .field(SourceField::new("id", "ID!")),
        );
    let supergraph = Supergraph::compose(&[media]).unwrap();
    let api_schema = supergraph.to_api_schema();

    assert!(api_schema.contains("union Media = Book\n"));
    assert!(!api_schema.contains("Draft"));
    assert!(api_schema.contains("type Book implements Node {"));
    // The annotated schema keeps everything.
    assert!(supergraph.schema().print().contains("type Draft implements Node @inaccessible"));
}
