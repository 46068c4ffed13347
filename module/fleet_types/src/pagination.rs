//! Cursor pagination types shared by repositories and the HTTP layer.

use serde::{ Deserialize, Serialize };
use uuid::Uuid;

/// Smallest accepted page size.
pub const PAGE_LIMIT_MIN: i64 = 1;
/// Largest accepted page size.
pub const PAGE_LIMIT_MAX: i64 = 100;
/// Page size when the caller does not ask for one.
pub const PAGE_LIMIT_DEFAULT: i64 = 20;

/// Clamp a requested page size into the accepted window.
pub fn clamp_limit( requested: Option< i64 > ) -> i64
{
  requested.unwrap_or( PAGE_LIMIT_DEFAULT ).clamp( PAGE_LIMIT_MIN, PAGE_LIMIT_MAX )
}

/// One page of results.
///
/// `next_cursor` is the id of the last item when a further page may exist,
/// and null when the page came back short.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CursorPage< T >
{
  /// Page contents.
  pub items: Vec< T >,
  /// Cursor for the next page, if any.
  pub next_cursor: Option< Uuid >,
  /// Effective page size used.
  pub limit: i64,
  /// Total rows matching the query.
  pub total: i64,
}

impl< T > CursorPage< T >
{
  /// Assemble a page from a fetched slice, deriving `next_cursor` from the
  /// page being full.
  pub fn new( items: Vec< T >, limit: i64, total: i64, id_of: impl Fn( &T ) -> Uuid ) -> Self
  {
    let next_cursor = if items.len() as i64 == limit
    {
      items.last().map( &id_of )
    }
    else
    {
      None
    };
    Self { items, next_cursor, limit, total }
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn limit_clamping()
  {
    assert_eq!( clamp_limit( None ), 20 );
    assert_eq!( clamp_limit( Some( 0 ) ), 1 );
    assert_eq!( clamp_limit( Some( 1_000 ) ), 100 );
    assert_eq!( clamp_limit( Some( 50 ) ), 50 );
  }

  #[ test ]
  fn short_page_has_no_cursor()
  {
    let ids: Vec< Uuid > = ( 0..3 ).map( |_| Uuid::new_v4() ).collect();
    let page = CursorPage::new( ids.clone(), 20, 3, |id| *id );
    assert!( page.next_cursor.is_none() );

    let full = CursorPage::new( ids.clone(), 3, 10, |id| *id );
    assert_eq!( full.next_cursor, Some( ids[ 2 ] ) );
  }
}
